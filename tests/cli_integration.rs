//! Integration tests for the command-line interface
//!
//! Runs the built binary against temporary projects

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const KERNEL: &str = r#"<?php

use Symfony\Component\HttpKernel\Kernel;

class AppKernel extends Kernel
{
    public function registerBundles()
    {
        $bundles = [
            new Symfony\Bundle\FrameworkBundle\FrameworkBundle(),
        ];

        return $bundles;
    }
}
"#;

const ROUTING: &str = "app:\n    resource: '@AppBundle/Controller/'\n    type: annotation\n";

const CONFIG: &str = "imports:\n    - { resource: parameters.yml }\n\nframework:\n    secret: '%secret%'\n";

/// Helper to create a project with kernel, routing and configuration files
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let config_dir = dir.path().join("app/config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(dir.path().join("app/AppKernel.php"), KERNEL).unwrap();
    fs::write(config_dir.join("routing.yml"), ROUTING).unwrap();
    fs::write(config_dir.join("config.yml"), CONFIG).unwrap();

    dir
}

fn run(args: &[&str], project: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bundle-patcher"))
        .args(args)
        .arg("--project-root")
        .arg(project)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn read(project: &Path, file: &str) -> String {
    fs::read_to_string(project.join(file)).unwrap()
}

#[test]
fn test_register_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_bundle-patcher"))
        .args(["register", "--help"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--dry-run"));
    assert!(stdout.contains("--bundle-name"));
}

#[test]
fn test_register_basic() {
    let project = setup_project();
    let output = run(&["register", "Acme/BlogBundle"], project.path());

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Enabling the bundle inside"));
    assert!(stdout.contains("Done!"));

    assert!(read(project.path(), "app/AppKernel.php")
        .contains("            new Acme\\BlogBundle\\AcmeBlogBundle(),\n        ];"));
    assert!(read(project.path(), "app/config/routing.yml").contains("AcmeBlogBundle:\n"));
    assert!(read(project.path(), "app/config/config.yml")
        .contains("@AcmeBlogBundle/Resources/config/services.yml"));
}

#[test]
fn test_register_idempotent() {
    let project = setup_project();
    let first = run(&["register", "Acme/BlogBundle"], project.path());
    assert!(first.status.success());
    let kernel = read(project.path(), "app/AppKernel.php");

    let output = run(&["register", "Acme/BlogBundle"], project.path());
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Already present"));
    assert!(stdout.contains("is already defined in AppKernel::registerBundles()"));
    assert_eq!(read(project.path(), "app/AppKernel.php"), kernel);
}

#[test]
fn test_register_dry_run_with_diff() {
    let project = setup_project();
    let output = run(
        &["register", "Acme/BlogBundle", "--dry-run", "--diff"],
        project.path(),
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DRY RUN"));
    assert!(stdout.contains("Would apply"));
    assert!(stdout.contains("+            new Acme\\BlogBundle\\AcmeBlogBundle(),"));

    assert_eq!(read(project.path(), "app/AppKernel.php"), KERNEL);
    assert_eq!(read(project.path(), "app/config/routing.yml"), ROUTING);
    assert_eq!(read(project.path(), "app/config/config.yml"), CONFIG);
}

#[test]
fn test_shared_bundle_leaves_services_alone() {
    let project = setup_project();
    let output = run(&["register", "Acme/BlogBundle", "--shared"], project.path());

    assert!(output.status.success());
    assert_eq!(read(project.path(), "app/config/config.yml"), CONFIG);
}

#[test]
fn test_shared_bundle_defaults_to_xml_routing() {
    let project = setup_project();
    let output = run(&["register", "Acme/BlogBundle", "--shared"], project.path());

    assert!(output.status.success(), "{output:?}");
    let routing = read(project.path(), "app/config/routing.yml");
    assert!(routing.contains("@AcmeBlogBundle/Resources/config/routing.xml"));
    assert!(!routing.contains("@AcmeBlogBundle/Controller/"));
}

#[test]
fn test_manual_follow_ups_exit_nonzero() {
    let project = setup_project();
    fs::write(
        project.path().join("app/config/config.yml"),
        "framework:\n    secret: '%secret%'\n",
    )
    .unwrap();

    let output = run(&["register", "Acme/BlogBundle"], project.path());

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("You'll need to make the following changes manually."));
    assert!(stderr.contains("- Edit app/config/config.yml"));
    assert!(stderr.contains("{ resource: \"@AcmeBlogBundle/Resources/config/services.yml\" }"));
    // The other steps still ran
    assert!(read(project.path(), "app/config/routing.yml").contains("AcmeBlogBundle:"));
}

#[test]
fn test_project_config_selects_targets() {
    let project = setup_project();
    fs::write(
        project.path().join("app/config/routing.xml"),
        "<routes>\n    <import resource=\"@AppBundle/Controller/\" type=\"annotation\" />\n</routes>\n",
    )
    .unwrap();
    fs::write(
        project.path().join("bundle-patcher.toml"),
        "[routing]\npath = \"app/config/routing.xml\"\n",
    )
    .unwrap();

    let output = run(
        &["register", "Acme/BlogBundle", "--shared", "--format", "annotation"],
        project.path(),
    );

    assert!(output.status.success(), "{output:?}");
    assert!(read(project.path(), "app/config/routing.xml")
        .contains("    <import resource=\"@AcmeBlogBundle/Controller/\" type=\"annotation\" prefix=\"/\" />\n</routes>"));
    assert_eq!(read(project.path(), "app/config/routing.yml"), ROUTING);
}

#[test]
fn test_status_command() {
    let project = setup_project();
    let output = run(&["status", "Acme/BlogBundle"], project.path());

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Registration Status Report"));
    assert!(stdout.contains("PENDING (3 steps)"));
    assert_eq!(read(project.path(), "app/AppKernel.php"), KERNEL);
}

#[test]
fn test_invalid_namespace() {
    let project = setup_project();
    let output = run(&["register", "Acme/class/Blog"], project.path());

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("reserved words"));
}

#[test]
fn test_target_outside_project_is_rejected() {
    let project = setup_project();
    let outside = TempDir::new().unwrap();
    let kernel = outside.path().join("AppKernel.php");
    fs::write(&kernel, KERNEL).unwrap();

    let output = run(
        &["register", "Acme/BlogBundle", "--kernel", kernel.to_str().unwrap()],
        project.path(),
    );

    assert!(!output.status.success());
    assert_eq!(fs::read_to_string(&kernel).unwrap(), KERNEL);
}
