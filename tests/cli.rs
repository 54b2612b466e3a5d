use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const HEADER: &str = "numero AMM;nom produit;seconds noms commerciaux;mentions autorisees;Substances actives;fonctions;gamme usage;Date de première autorisation;identifiant usage;etat usage;dose retenue;dose retenue unite;nombre max d'application;delai avant recolte jour;intervalle minimum entre applications (jour);date decision;condition emploi";

fn usage(id: &str, mentions: &str, usage_id: &str, dose: &str) -> String {
    format!(
        "{id};produit {id};;{mentions};Soufre (Sulphur) 800.0 g/kg;Fongicide;Professionnel;2012-04-01;{usage_id};Autorisé;{dose};kg/ha;8;5;8;2020-01-15;"
    )
}

fn write_source(dir: &Path) -> std::path::PathBuf {
    let lines = [
        HEADER.to_string(),
        usage("1", "Utilisable en agriculture biologique", "Vigne*Trt Part.Aer.*Oïdium", "12.5"),
        usage("2", "Non", "Vigne*Trt Part.Aer.*Oïdium", "10"),
        usage("3", "Oui", "Vigne*Trt Part.Aer.*Mildiou(s)", "N/A"),
    ];
    let path = dir.join("usages.csv");
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();
    path
}

fn cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("vigne-amm").unwrap();
    cmd.env("HOME", home.path())
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn run_from_local_table() {
    let home = TempDir::new().unwrap();
    let source = write_source(home.path());
    let output = home.path().join("out").join("amm.csv");

    cmd(&home)
        .args(["run", "--csv"])
        .arg(&source)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 rows written"))
        .stdout(predicate::str::contains("1 rows skipped"))
        .stderr(predicate::str::contains("N/A"));

    let text = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Numéro AMM;Spécialité commerciale;"));
    assert!(lines[1].starts_with("1;PRODUIT 1;;vine;powdery mildew;sulphur;Soufre;80,00;12,5;kg/ha;10,0;8;8;5;0;0;;01/04/2012;15/01/2020"));
}

#[test]
fn missing_source_fails() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["run", "--csv", "does-not-exist.csv", "--output"])
        .arg(home.path().join("amm.csv"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error: "));
    assert!(!home.path().join("amm.csv").exists());
}

#[test]
fn missing_column_fails() {
    let home = TempDir::new().unwrap();
    let source = home.path().join("usages.csv");
    std::fs::write(&source, "numero AMM;nom produit\n1;x\n").unwrap();
    cmd(&home)
        .args(["run", "--csv"])
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing column"));
}

#[test]
fn source_flags_conflict() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["run", "--csv", "a.csv", "--archive", "b.zip"])
        .assert()
        .failure();
}

#[test]
fn config_init_then_show() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("settings.json"));
    assert!(home.path().join(".config/vigne-amm/settings.json").exists());

    cmd(&home).args(["config", "init"]).assert().failure();
    cmd(&home).args(["config", "init", "--force"]).assert().success();

    cmd(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"archive_entry\": \"usages_des_produits_autorises_v3_utf8.csv\""));
}

#[test]
fn explicit_config_must_exist() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["--config", "nowhere.json", "config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Settings error"));
}

#[test]
fn invalid_vocabulary_is_rejected() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("settings.json");
    std::fs::write(&path, r#"{"criteria": {"crop_synonyms": []}}"#).unwrap();
    cmd(&home)
        .arg("--config")
        .arg(&path)
        .arg("vocab")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Settings error"));
}

#[test]
fn vocab_lists_categories() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .arg("vocab")
        .assert()
        .success()
        .stdout(predicate::str::contains("powdery mildew"))
        .stdout(predicate::str::contains("leafhopper"))
        .stdout(predicate::str::contains("vigne"));
}
