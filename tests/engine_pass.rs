//! End-to-end passes over a scratch calculation directory.

use std::path::{Path, PathBuf};
use tasker::core::config::Config;
use tasker::core::executor::{reset_block, Engine};
use tasker::core::state::{self, PassLock};
use tasker::core::types::{BlockStatus, GeometryRecord};
use tasker::geometry::{GeometryError, MoleculeResolver};

struct Methane;

impl MoleculeResolver for Methane {
    fn resolve(&self, _identifier: &str) -> Result<GeometryRecord, GeometryError> {
        Ok(GeometryRecord {
            charge: 0,
            spin_multiplicity: 1,
            coordinates: vec![
                "C 0.000000 0.000000 0.000000".to_string(),
                "H 0.000000 0.000000 1.090000".to_string(),
            ],
            solver_keywords: None,
        })
    }
}

/// Resolves like [`Methane`] after replacing the task file with a
/// directory, so every later write to the task file fails.
struct ClobberTaskFile(PathBuf);

impl MoleculeResolver for ClobberTaskFile {
    fn resolve(&self, identifier: &str) -> Result<GeometryRecord, GeometryError> {
        std::fs::remove_file(&self.0).ok();
        std::fs::create_dir_all(&self.0).ok();
        Methane.resolve(identifier)
    }
}

struct Fixture {
    _root: tempfile::TempDir,
    root: PathBuf,
    dir: PathBuf,
}

impl Fixture {
    fn new(task: &str) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let dir = root.join("calc").join("he");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("he.task"), task).unwrap();
        std::fs::write(dir.join("he.xyz"), "1\n0 1\nHe 0.0 0.0 0.0\n").unwrap();
        Self {
            _root: tmp,
            root,
            dir,
        }
    }

    fn engine(&self) -> Engine {
        self.engine_with(Box::new(Methane))
    }

    fn engine_with(&self, molecules: Box<dyn MoleculeResolver>) -> Engine {
        let mut config = Config::rooted(&self.root.join("calc"), &self.root.join("home"), &self.root);
        config.ledger_path = self.root.join("ledger.txt");
        Engine::with_resolver(config, molecules)
    }

    fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.dir.join(rel)).unwrap()
    }

    fn task_text(&self) -> String {
        self.read("he.task")
    }
}

fn solver_log(terminated: bool) -> String {
    let mut s = String::from(
        " #p opt b3lyp/6-31g(d)\n\
         ----------------------\n\
         Charge =  0 Multiplicity = 1\n\
         Standard orientation:\n\
         ---------------------------------------------------------------------\n\
         Center     Atomic      Atomic             Coordinates (Angstroms)\n\
         Number     Number       Type             X           Y           Z\n\
         ---------------------------------------------------------------------\n\
         1          2           0        0.000000    0.000000    0.100000\n\
         ---------------------------------------------------------------------\n",
    );
    if terminated {
        s.push_str(" Normal termination of Gaussian 16 at Mon Feb 16 14:00:00 2026.\n");
    }
    s
}

fn write_log(dir: &Path, title: &str, terminated: bool) {
    let path = dir.join(title).join(format!("{}_he.log", title));
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, solver_log(terminated)).unwrap();
}

const SCENARIO: &str = "$opt
# opt b3lyp/6-31g(d)
!scripts=(fchk) copy=(*.fchk>../FCclasses) convtest

$opt2
%opt
# freq {b3lyp,pbe0}/6-31g(d)
";

#[test]
fn single_atom_scenario() {
    let fx = Fixture::new(SCENARIO);
    let mut engine = fx.engine();

    // Pass 1: opt from the base structure, opt2 waits for opt's log
    let r = engine.run_pass().unwrap();
    assert_eq!(r.len(), 1);
    assert_eq!((r[0].generated, r[0].skipped, r[0].failed), (1, 1, 0));

    let gjf = fx.read("opt/opt_he.gjf");
    let abs = std::path::absolute(&fx.dir).unwrap();
    assert_eq!(
        gjf,
        format!(
            "%chk={}/opt/opt_he.chk\n# opt b3lyp/6-31g(d)\n\nopt\n\n0 1\nHe 0.0 0.0 0.0\n\n\n",
            abs.display()
        )
    );
    assert!(fx.task_text().starts_with("$\"opt\"\n"));
    assert!(fx.task_text().contains("\n$opt2\n"));

    let comd = fx.read("opt/comd");
    assert!(comd.starts_with("# Command file generated by task processor\n"));
    assert!(comd.contains("bash $tasker_scripts/fchk.sh\n"));
    assert!(comd.contains("mkdir -p ../FCclasses\ncp -r *.fchk ../FCclasses/\n"));
    let ledger = std::fs::read_to_string(fx.root.join("ledger.txt")).unwrap();
    assert_eq!(ledger, format!("{}\n", abs.join("opt").display()));

    // Pass 2: nothing changes
    let before = (fx.task_text(), gjf.clone(), comd.clone());
    let r = engine.run_pass().unwrap();
    assert_eq!((r[0].generated, r[0].commands_emitted), (0, 0));
    assert_eq!(before, (fx.task_text(), fx.read("opt/opt_he.gjf"), fx.read("opt/comd")));

    // Unterminated log still gates
    write_log(&fx.dir, "opt", false);
    let r = engine.run_pass().unwrap();
    assert_eq!(r[0].generated, 0);

    // Pass 3: opt terminated, opt2 expands into two inputs
    write_log(&fx.dir, "opt", true);
    let r = engine.run_pass().unwrap();
    assert_eq!(r[0].generated, 1);
    let a = fx.read("opt2/b3lyp_opt2_he.gjf");
    let b = fx.read("opt2/pbe0_opt2_he.gjf");
    assert!(a.contains("\n# freq b3lyp/6-31g(d)\n"));
    assert!(b.contains("\n# freq pbe0/6-31g(d)\n"));
    assert!(a.contains("\nHe 0.000000 0.000000 0.100000\n"));

    let text = fx.task_text();
    assert!(text.contains("$\"opt\"\n"));
    assert!(text.contains("$\"opt2\"\n"));
    assert!(!text.contains("$\"opt\"2"));

    let st = state::load_state(&fx.dir, "he").unwrap().unwrap();
    assert_eq!(st.blocks["opt2"].status, BlockStatus::Done);
    assert_eq!(st.blocks["opt2"].artifacts.len(), 2);
}

#[test]
fn restart_quarantines_each_attempt() {
    let fx = Fixture::new("$opt\n%restart\n# opt\n");
    let mut engine = fx.engine();

    // No own log yet: nothing to restart from
    let r = engine.run_pass_in(&fx.dir).unwrap();
    assert_eq!((r.generated, r.skipped), (0, 1));

    write_log(&fx.dir, "opt", false);
    std::fs::write(fx.dir.join("opt/opt_he.gjf"), "old input").unwrap();
    let r = engine.run_pass_in(&fx.dir).unwrap();
    assert_eq!(r.generated, 1);
    assert_eq!(fx.read("opt/fail/opt_he.gjf"), "old input");
    assert!(fx.dir.join("opt/fail/opt_he.log").exists());
    assert!(fx.read("opt/opt_he.gjf").contains("He 0.000000 0.000000 0.100000"));

    assert!(reset_block(&fx.dir, "opt").unwrap());
    write_log(&fx.dir, "opt", false);
    let r = engine.run_pass_in(&fx.dir).unwrap();
    assert_eq!(r.generated, 1);
    assert!(fx.dir.join("opt/fail1/opt_he.log").exists());
    assert!(fx.dir.join("opt/fail1/opt_he.gjf").exists());
    assert_eq!(fx.read("opt/fail/opt_he.gjf"), "old input");
}

#[test]
fn failed_restart_keeps_previous_run() {
    let fx = Fixture::new("$td\n-orca-\n%restart\n# job=tddft\n");
    write_log(&fx.dir, "td", false);
    let mut engine = fx.engine();

    // No template yet: the block fails and its log stays in place
    let r = engine.run_pass_in(&fx.dir).unwrap();
    assert_eq!((r.generated, r.failed), (0, 1));
    assert!(fx.dir.join("td/td_he.log").exists());
    assert!(!fx.dir.join("td/fail").exists());

    let orca = fx.root.join("home").join("ORCA");
    std::fs::create_dir_all(&orca).unwrap();
    std::fs::write(orca.join("tddft.inp"), "! TD\n* xyzfile [charge] [spin] [xyz_file]\n").unwrap();

    let r = engine.run_pass_in(&fx.dir).unwrap();
    assert_eq!((r.generated, r.failed), (1, 0));
    assert!(fx.dir.join("td/fail/td_he.log").exists());
    assert_eq!(fx.read("td/td.inp"), "! TD\n* xyzfile 0 1 td_he.xyz\n");
}

#[test]
fn restart_without_any_keywords_keeps_previous_run() {
    let fx = Fixture::new("$opt\n%restart\n");
    let path = fx.dir.join("opt").join("opt_he.log");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, solver_log(false).replacen(" #p opt b3lyp/6-31g(d)\n", "", 1)).unwrap();

    let r = fx.engine().run_pass_in(&fx.dir).unwrap();
    assert_eq!(r.failed, 1);
    assert!(path.exists());
    assert!(!fx.dir.join("opt/fail").exists());
}

#[test]
fn unwritable_task_file_fails_blocks_not_pass() {
    let fx = Fixture::new("$a\n%molecule=CH\n# opt\n\n$b\n# sp\n");
    let mut engine = fx.engine_with(Box::new(ClobberTaskFile(fx.dir.join("he.task"))));

    let r = engine.run_pass_in(&fx.dir).unwrap();
    assert_eq!((r.generated, r.failed), (0, 2));
    assert!(fx.dir.join("b/b_he.gjf").exists());

    let st = state::load_state(&fx.dir, "he").unwrap().unwrap();
    for title in ["a", "b"] {
        assert_eq!(st.blocks[title].status, BlockStatus::Failed);
        assert!(st.blocks[title]
            .error
            .as_deref()
            .unwrap()
            .contains("cannot update"));
    }
}

#[test]
fn molecule_override_and_carried_keywords() {
    let fx = Fixture::new("$opt\n%molecule=CH\n# opt\n\n$freq\n%opt\n");
    let mut engine = fx.engine();
    engine.run_pass_in(&fx.dir).unwrap();
    assert!(fx.read("opt/opt_he.gjf").contains("C 0.000000 0.000000 0.000000\n"));

    // freq has no keywords: the route of opt's log is carried over
    write_log(&fx.dir, "opt", true);
    let r = engine.run_pass_in(&fx.dir).unwrap();
    assert_eq!(r.generated, 1);
    assert!(fx.read("freq/freq_he.gjf").contains("\n#p opt b3lyp/6-31g(d)\n"));
}

#[test]
fn edited_definition_runs_again() {
    let fx = Fixture::new("$opt\n# opt\n");
    let mut engine = fx.engine();
    engine.run_pass_in(&fx.dir).unwrap();

    std::fs::write(fx.dir.join("he.task"), "$opt\n# opt freq\n").unwrap();
    let r = engine.run_pass_in(&fx.dir).unwrap();
    assert_eq!(r.generated, 1);
    assert!(fx.read("opt/opt_he.gjf").contains("\n# opt freq\n"));
}

#[test]
fn template_task_file_is_imported() {
    let fx = Fixture::new("@txt=chain\n");
    let templates = fx.root.join("home").join("templates");
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::write(templates.join("chain.txt"), "$sp\n# sp\n").unwrap();

    let r = fx.engine().run_pass_in(&fx.dir).unwrap();
    assert_eq!(r.generated, 1);
    assert_eq!(fx.task_text(), "$\"sp\"\n# sp\n");
}

#[test]
fn secondary_block_uses_orca_template() {
    let fx = Fixture::new("$opt\n# opt\n\n$td\n-orca-\n%opt\n# job=tddft nroots=5\n");
    let orca = fx.root.join("home").join("ORCA");
    std::fs::create_dir_all(&orca).unwrap();
    std::fs::write(
        orca.join("tddft.inp"),
        "! B3LYP def2-SVP\n%tddft nroots [nroots] end\n* xyzfile [charge] [spin] [xyz_file]\n-default-\nnroots=10\n",
    )
    .unwrap();

    let mut engine = fx.engine();
    engine.run_pass_in(&fx.dir).unwrap();
    write_log(&fx.dir, "opt", true);
    let r = engine.run_pass_in(&fx.dir).unwrap();
    assert_eq!(r.generated, 1);
    assert_eq!(
        fx.read("td/td.inp"),
        "! B3LYP def2-SVP\n%tddft nroots 5 end\n* xyzfile 0 1 td_he.xyz\n"
    );
    assert!(fx.read("td/td_he.xyz").starts_with("1\ncharge=0 spin=1\n"));
}

#[test]
fn locked_directory_is_skipped() {
    let fx = Fixture::new("$opt\n# opt\n");
    let _held = PassLock::acquire(&std::path::absolute(&fx.dir).unwrap()).unwrap();
    let r = fx.engine().run_pass().unwrap();
    assert!(r.is_empty());
    assert!(!fx.dir.join("opt").exists());
}
