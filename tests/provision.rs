use std::cell::RefCell;
use std::fs;
use std::os::unix::fs::{chown, MetadataExt};
use std::path::Path;

use tempfile::TempDir;

use dkim_provision::config::{Config, KeySpec};
use dkim_provision::error::{ProvisionError, Result};
use dkim_provision::provision::{run, RunOutcome};
use dkim_provision::resolver::sources::DomainSource;
use dkim_provision::utils::dkim::{KeyGenerator, KeyPairFiles};

/// Writes placeholder key files and remembers which domains it was asked for.
#[derive(Default)]
struct RecordingGenerator {
    generated: RefCell<Vec<String>>,
    fail_on: Option<&'static str>,
}

impl KeyGenerator for RecordingGenerator {
    fn generate_keypair(&self, spec: &KeySpec, dir: &Path) -> Result<KeyPairFiles> {
        if self.fail_on == Some(spec.domain.as_str()) {
            return Err(ProvisionError::UnsupportedKeySize(0));
        }
        self.generated.borrow_mut().push(spec.domain.to_string());
        let files = KeyPairFiles::in_dir(spec, dir);
        fs::write(&files.private_key, format!("private for {}", spec.domain)).unwrap();
        fs::write(&files.public_record, format!("record for {}", spec.domain)).unwrap();
        Ok(files)
    }
}

struct Listed(Vec<&'static str>);

impl DomainSource for Listed {
    fn name(&self) -> &'static str {
        "listed"
    }

    fn domains(&self) -> Result<Vec<String>> {
        Ok(self.0.iter().map(|d| d.to_string()).collect())
    }
}

fn config(dir: &TempDir) -> Config {
    let mut config = Config::new(dir.path().join("opendkim"));
    config.domain_list = dir.path().join("vhost.dkim");
    config
}

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn full_run_writes_keys_and_tables() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let generator = RecordingGenerator::default();

    let outcome = run(&config, &[&Listed(vec!["example.com"])], &generator).unwrap();

    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(report.keys_generated, 1);
    assert_eq!(report.rows_added, 2);

    let key_path = config.base_dir.join("keys/example.com/mail.private");
    assert!(key_path.is_file());
    assert!(config.base_dir.join("keys/example.com/mail.txt").is_file());
    assert_eq!(
        read(config.key_table()),
        format!(
            "mail._domainkey.example.com example.com:mail:{}\n",
            key_path.display()
        )
    );
    assert_eq!(
        read(config.signing_table()),
        "*@example.com mail._domainkey.example.com\n"
    );
    assert_eq!(read(config.trusted_hosts()), "127.0.0.1\nlocalhost\n");
    assert!(!config.domain_list.exists());
}

#[test]
fn second_run_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let generator = RecordingGenerator::default();
    let source = Listed(vec!["a.com", "b.com"]);

    run(&config, &[&source], &generator).unwrap();
    let key_table = read(config.key_table());
    let signing_table = read(config.signing_table());
    let key = read(config.base_dir.join("keys/a.com/mail.private"));

    let RunOutcome::Completed(report) = run(&config, &[&source], &generator).unwrap() else {
        panic!("expected a completed run");
    };

    assert_eq!(report.keys_generated, 0);
    assert_eq!(report.keys_existing, 2);
    assert_eq!(report.rows_added, 0);
    assert_eq!(*generator.generated.borrow(), vec!["a.com", "b.com"]);
    assert_eq!(read(config.key_table()), key_table);
    assert_eq!(read(config.signing_table()), signing_table);
    assert_eq!(read(config.base_dir.join("keys/a.com/mail.private")), key);
    assert_eq!(read(config.key_table()).lines().count(), 2);
}

#[test]
fn sources_are_unioned() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let generator = RecordingGenerator::default();

    run(
        &config,
        &[&Listed(vec!["a.com", "b.com"]), &Listed(vec!["b.com", "c.com"])],
        &generator,
    )
    .unwrap();

    let mut generated = generator.generated.borrow().clone();
    generated.sort();
    assert_eq!(generated, vec!["a.com", "b.com", "c.com"]);
    assert_eq!(read(config.signing_table()).lines().count(), 3);
}

#[test]
fn override_replaces_discovery() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.domain_override = Some("x.com,y.com".into());
    let generator = RecordingGenerator::default();

    run(&config, &[&Listed(vec!["a.com"])], &generator).unwrap();

    assert_eq!(*generator.generated.borrow(), vec!["x.com", "y.com"]);
    assert!(!config.base_dir.join("keys/a.com").exists());
}

#[test]
fn no_domains_leaves_config_untouched() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    fs::create_dir_all(&config.base_dir).unwrap();
    fs::write(config.key_table(), "old row\n").unwrap();

    let outcome = run(&config, &[&Listed(vec![])], &RecordingGenerator::default()).unwrap();

    assert_eq!(outcome, RunOutcome::NoDomains);
    assert!(!config.keys_dir().exists());
    assert_eq!(read(config.key_table()), "old row\n");
    assert!(!config.signing_table().exists());
    assert!(!config.trusted_hosts().exists());
    assert!(!config.domain_list.exists());
}

#[test]
fn custom_trusted_hosts_survive() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    fs::create_dir_all(&config.base_dir).unwrap();
    fs::write(config.trusted_hosts(), "192.168.0.0/16\nrelay.example.com\n").unwrap();

    run(&config, &[&Listed(vec!["example.com"])], &RecordingGenerator::default()).unwrap();

    assert_eq!(
        read(config.trusted_hosts()),
        "192.168.0.0/16\nrelay.example.com\n"
    );
}

#[test]
fn failure_mid_loop_resumes_on_rerun() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let source = Listed(vec!["a.com", "b.com", "c.com"]);

    let failing = RecordingGenerator {
        fail_on: Some("b.com"),
        ..Default::default()
    };
    assert!(run(&config, &[&source], &failing).is_err());
    assert_eq!(read(config.key_table()).lines().count(), 1);
    assert!(!config.base_dir.join("keys/b.com/mail.private").exists());

    let generator = RecordingGenerator::default();
    run(&config, &[&source], &generator).unwrap();

    assert_eq!(*generator.generated.borrow(), vec!["b.com", "c.com"]);
    assert_eq!(read(config.key_table()).lines().count(), 3);
    assert_eq!(read(config.signing_table()).lines().count(), 3);
}

#[test]
fn rspamd_takeover_forwards_args_and_status() {
    use dkim_provision::guard::signer_guard::{check_signer, run_delegate, GuardOutcome, SignerSettings};
    use std::ffi::OsString;

    let settings = SignerSettings {
        opendkim_enabled: false,
        rspamd_enabled: true,
        delegate: "/bin/sh".into(),
    };
    let original: Vec<OsString> = vec!["-c".into(), "exit 42".into()];

    let GuardOutcome::DelegateTo { entry_point, args } = check_signer(&settings, &original) else {
        panic!("expected delegation");
    };
    assert_eq!(args, original);
    assert_eq!(run_delegate(&entry_point, &args).unwrap(), 42);
}

// Changing ownership to a foreign uid needs root; skipped otherwise.
fn running_as_root(dir: &TempDir) -> bool {
    fs::metadata(dir.path()).unwrap().uid() == 0
}

fn assert_tree_owned_by(root: &Path, uid: u32, gid: u32) {
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.unwrap();
        let meta = entry.metadata().unwrap();
        assert_eq!(
            (meta.uid(), meta.gid()),
            (uid, gid),
            "{} has the wrong owner",
            entry.path().display()
        );
    }
}

#[test]
fn fresh_config_dir_takes_the_volume_owner() {
    let dir = TempDir::new().unwrap();
    if !running_as_root(&dir) {
        return;
    }
    chown(dir.path(), Some(5000), Some(5000)).unwrap();
    let config = config(&dir);
    assert!(!config.base_dir.exists());

    let RunOutcome::Completed(report) =
        run(&config, &[&Listed(vec!["example.com"])], &RecordingGenerator::default()).unwrap()
    else {
        panic!("expected a completed run");
    };

    assert_tree_owned_by(&config.base_dir, 5000, 5000);
    assert!(report.ownership_changes > 0);
}

#[test]
fn existing_config_dir_keeps_its_owner() {
    let dir = TempDir::new().unwrap();
    if !running_as_root(&dir) {
        return;
    }
    let config = config(&dir);
    fs::create_dir_all(&config.base_dir).unwrap();
    chown(&config.base_dir, Some(5000), Some(5001)).unwrap();

    run(&config, &[&Listed(vec!["a.com", "b.com"])], &RecordingGenerator::default()).unwrap();

    assert_tree_owned_by(&config.base_dir, 5000, 5001);
    assert_eq!(fs::metadata(dir.path()).unwrap().uid(), 0);
}
