//! Keyword-set expansion.
//!
//! A `{a,b,c}` group in a keyword template fans out into one route line per
//! option. Several groups expand as a Cartesian product, leftmost group
//! varying slowest; the tag joins the chosen options with `_`.

/// One expanded route line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedKeyword {
    pub keywords: String,
    pub tag: Option<String>,
}

impl ExpandedKeyword {
    /// File-name prefix: `"<tag>_"`, or empty without a tag. `/` becomes `-`.
    pub fn file_prefix(&self) -> String {
        match &self.tag {
            Some(tag) => format!("{}_", tag.replace('/', "-")),
            None => String::new(),
        }
    }
}

#[derive(Debug)]
enum Segment<'a> {
    Text(&'a str),
    Group(Vec<&'a str>),
}

/// Split a template into literal text and option groups.
fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(len) = rest[open..].find('}') else {
            break;
        };
        let close = open + len;
        let options: Vec<&str> = rest[open + 1..close]
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .collect();
        if options.is_empty() {
            // All-empty group stays literal
            out.push(Segment::Text(&rest[..=close]));
        } else {
            if open > 0 {
                out.push(Segment::Text(&rest[..open]));
            }
            out.push(Segment::Group(options));
        }
        rest = &rest[close + 1..];
    }
    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    out
}

/// Expand a keyword template into its route lines.
pub fn expand(template: &str) -> Vec<ExpandedKeyword> {
    let segs = segments(template);
    if !segs.iter().any(|s| matches!(s, Segment::Group(_))) {
        return vec![ExpandedKeyword {
            keywords: template.to_string(),
            tag: None,
        }];
    }

    let mut partial: Vec<(String, Vec<&str>)> = vec![(String::new(), Vec::new())];
    for seg in &segs {
        partial = match seg {
            Segment::Text(text) => partial
                .into_iter()
                .map(|(mut kw, tags)| {
                    kw.push_str(text);
                    (kw, tags)
                })
                .collect(),
            Segment::Group(options) => partial
                .into_iter()
                .flat_map(|(kw, tags)| {
                    options.iter().map(move |opt| {
                        let mut tags = tags.clone();
                        tags.push(*opt);
                        (format!("{}{}", kw, opt), tags)
                    })
                })
                .collect(),
        };
    }

    partial
        .into_iter()
        .map(|(keywords, tags)| ExpandedKeyword {
            keywords,
            tag: Some(tags.join("_")),
        })
        .collect()
}
