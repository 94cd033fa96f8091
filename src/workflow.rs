//! Runs the three registrations for one bundle and gathers what is left
//! for the user to do by hand.
//!
//! A step that cannot be applied never stops the run: every step is
//! attempted, and the [`Report`] lists all manual follow-ups at the end.

use crate::bootstrap::{BootstrapLayout, BootstrapRegistrationManipulator};
use crate::descriptor::BundleDescriptor;
use crate::fs::{FileSystem, LocalFs};
use crate::outcome::{Instruction, Outcome, PatchError};
use crate::routing::{RouteImport, RouteImportManipulator, RoutingSyntax};
use crate::services::ServiceImportManipulator;
use std::path::{Path, PathBuf};
use tracing::{info, info_span};

pub const DONE_MESSAGE: &str = "Done!";
pub const MANUAL_MESSAGE: &str = "The command was not able to configure everything automatically. You'll need to make the following changes manually.";

/// Files patched for a registration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    pub kernel: PathBuf,
    pub layout: BootstrapLayout,
    pub routing: PathBuf,
    pub services: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Kernel,
    Routing,
    Services,
}

/// One attempted registration.
#[derive(Debug)]
pub struct Step {
    pub kind: StepKind,
    /// e.g. "Enabling the bundle inside app/AppKernel.php"
    pub description: String,
    pub result: Result<Outcome, PatchError>,
    /// Shown when the entry was already registered
    pub note: String,
    /// Manual instruction for failures that carry none
    pub fallback: Instruction,
}

impl Step {
    pub fn is_done(&self) -> bool {
        matches!(
            self.result,
            Ok(Outcome::Applied { .. }) | Ok(Outcome::AlreadyPresent { .. })
        )
    }

    /// Lines the user must act on; empty when the step is done.
    pub fn follow_up(&self) -> Vec<String> {
        match &self.result {
            Ok(Outcome::Applied { .. }) | Ok(Outcome::AlreadyPresent { .. }) => Vec::new(),
            Ok(Outcome::AnchorNotFound { instruction, .. })
            | Ok(Outcome::MalformedTarget { instruction, .. }) => instruction.lines(),
            Err(err) => {
                let mut lines = vec![format!("- {err}")];
                lines.extend(self.fallback.lines());
                lines
            }
        }
    }
}

/// Result of a whole run.
#[derive(Debug, Default)]
pub struct Report {
    pub steps: Vec<Step>,
}

impl Report {
    /// Every step was applied or already present.
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(Step::is_done)
    }

    /// Notes for entries that were already registered.
    pub fn notes(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|step| matches!(step.result, Ok(Outcome::AlreadyPresent { .. })))
            .map(|step| step.note.as_str())
            .collect()
    }

    pub fn follow_ups(&self) -> Vec<String> {
        self.steps.iter().flat_map(Step::follow_up).collect()
    }

    /// Closing message, followed by every follow-up when something is left.
    pub fn summary(&self) -> Vec<String> {
        if self.is_complete() {
            return vec![DONE_MESSAGE.to_string()];
        }
        let mut lines = vec![MANUAL_MESSAGE.to_string(), String::new()];
        lines.extend(self.follow_ups());
        lines
    }
}

pub struct Workflow<F: FileSystem = LocalFs> {
    root: PathBuf,
    targets: Targets,
    fs: F,
}

impl Workflow<LocalFs> {
    pub fn new(root: impl Into<PathBuf>, targets: Targets) -> Self {
        Self::with_fs(root, targets, LocalFs)
    }
}

impl<F: FileSystem> Workflow<F> {
    pub fn with_fs(root: impl Into<PathBuf>, targets: Targets, fs: F) -> Self {
        Self {
            root: root.into(),
            targets,
            fs,
        }
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Register `bundle` in the kernel, routing and (unless shared) services
    /// configuration, in that order.
    pub fn register(&self, bundle: &BundleDescriptor) -> Report {
        let _span = info_span!("register", bundle = %bundle.class_name()).entered();
        let mut report = Report::default();

        report.steps.push(self.kernel_step(bundle));
        report.steps.push(self.routing_step(bundle));
        if bundle.needs_services_import() {
            report.steps.push(self.services_step(bundle));
        } else {
            info!("shared bundle, services are loaded by its extension");
        }

        report
    }

    fn kernel_step(&self, bundle: &BundleDescriptor) -> Step {
        let manipulator = BootstrapRegistrationManipulator::with_fs(
            &self.targets.kernel,
            self.targets.layout.clone(),
            &self.fs,
        );
        let class_name = bundle.class_name();
        let fragment = self.targets.layout.render_entry(&class_name);
        let kernel_class = self
            .targets
            .kernel
            .file_stem()
            .and_then(|stem| stem.to_str());

        let step = Step {
            kind: StepKind::Kernel,
            description: format!(
                "Enabling the bundle inside {}",
                self.relative(manipulator.filename())
            ),
            result: manipulator.register(&class_name, &fragment),
            note: format!(
                "Bundle {class_name} is already defined in {}.",
                self.targets.layout.location(kernel_class)
            ),
            fallback: manipulator.instruction("", &fragment),
        };
        self.relativize(step)
    }

    fn routing_step(&self, bundle: &BundleDescriptor) -> Step {
        let manipulator = RouteImportManipulator::with_fs(&self.targets.routing, &self.fs);
        let import = RouteImport::new(bundle.name(), bundle.format());

        let step = Step {
            kind: StepKind::Routing,
            description: format!(
                "Importing the bundle's routes from the {} file",
                self.relative(manipulator.filename())
            ),
            result: manipulator.add_resource(bundle.name(), bundle.format()),
            note: format!("Bundle {} is already imported.", bundle.name()),
            fallback: manipulator.instruction(
                &import,
                manipulator.syntax().unwrap_or(RoutingSyntax::Yaml),
            ),
        };
        self.relativize(step)
    }

    fn services_step(&self, bundle: &BundleDescriptor) -> Step {
        let manipulator = ServiceImportManipulator::with_fs(&self.targets.services, &self.fs);

        let step = Step {
            kind: StepKind::Services,
            description: format!(
                "Importing the bundle's {} from the {} file",
                bundle.services_configuration_filename(),
                self.relative(manipulator.filename())
            ),
            result: manipulator.add_resource(bundle),
            note: format!(
                "The bundle's {} is already imported.",
                bundle.services_resource()
            ),
            fallback: manipulator.instruction(bundle),
        };
        self.relativize(step)
    }

    /// `path` relative to the project root when it lies inside it.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    /// Rewrite absolute target paths in a step's instructions.
    fn relativize(&self, mut step: Step) -> Step {
        let targets = [
            &self.targets.kernel,
            &self.targets.routing,
            &self.targets.services,
        ];
        let rewrite = |instruction: &mut Instruction| {
            for line in &mut instruction.summary {
                for target in targets {
                    let absolute = target.display().to_string();
                    let relative = self.relative(target);
                    if absolute != relative && line.contains(&absolute) {
                        *line = line.replace(&absolute, &relative);
                    }
                }
            }
        };

        rewrite(&mut step.fallback);
        if let Ok(
            Outcome::AnchorNotFound { instruction, .. } | Outcome::MalformedTarget { instruction, .. },
        ) = &mut step.result
        {
            rewrite(instruction);
        }
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ConfigurationFormat;
    use crate::fs::DryRunFs;
    use std::fs;

    const KERNEL: &str = "<?php\n\nclass AppKernel extends Kernel\n{\n    public function registerBundles()\n    {\n        $bundles = [\n            new Symfony\\Bundle\\FrameworkBundle\\FrameworkBundle(),\n        ];\n\n        return $bundles;\n    }\n}\n";

    fn project() -> (tempfile::TempDir, Targets) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("app/config")).unwrap();
        fs::write(root.join("app/AppKernel.php"), KERNEL).unwrap();
        fs::write(
            root.join("app/config/routing.yml"),
            "app:\n    resource: '@AppBundle/Controller/'\n    type: annotation\n",
        )
        .unwrap();
        fs::write(
            root.join("app/config/config.yml"),
            "imports:\n    - { resource: parameters.yml }\n\nframework:\n    secret: s3cr3t\n",
        )
        .unwrap();

        let targets = Targets {
            kernel: root.join("app/AppKernel.php"),
            layout: BootstrapLayout::default(),
            routing: root.join("app/config/routing.yml"),
            services: root.join("app/config/config.yml"),
        };
        (dir, targets)
    }

    fn bundle(shared: bool) -> BundleDescriptor {
        BundleDescriptor::new("Acme/Blog", None, ConfigurationFormat::Annotation, shared).unwrap()
    }

    #[test]
    fn test_full_registration_then_rerun() {
        let (dir, targets) = project();
        let workflow = Workflow::new(dir.path(), targets.clone());

        let report = workflow.register(&bundle(false));
        assert_eq!(report.steps.len(), 3);
        assert!(report.steps.iter().all(|s| matches!(s.result, Ok(Outcome::Applied { .. }))));
        assert_eq!(report.summary(), vec![DONE_MESSAGE.to_string()]);
        assert_eq!(
            report.steps[0].description,
            format!("Enabling the bundle inside {}", Path::new("app").join("AppKernel.php").display())
        );

        let kernel = fs::read_to_string(&targets.kernel).unwrap();
        assert!(kernel.contains("            new Acme\\BlogBundle\\AcmeBlogBundle(),\n        ];"));

        let rerun = workflow.register(&bundle(false));
        assert!(rerun.is_complete());
        assert_eq!(
            rerun.notes(),
            vec![
                "Bundle Acme\\BlogBundle\\AcmeBlogBundle is already defined in AppKernel::registerBundles().",
                "Bundle AcmeBlogBundle is already imported.",
                "The bundle's @AcmeBlogBundle/Resources/config/services.yml is already imported.",
            ]
        );
        assert_eq!(fs::read_to_string(&targets.kernel).unwrap(), kernel);
    }

    #[test]
    fn test_shared_bundle_skips_services() {
        let (dir, targets) = project();
        let before = fs::read_to_string(&targets.services).unwrap();
        let report = Workflow::new(dir.path(), targets.clone()).register(&bundle(true));

        assert_eq!(report.steps.len(), 2);
        assert!(report.steps.iter().all(|s| s.kind != StepKind::Services));
        assert_eq!(fs::read_to_string(&targets.services).unwrap(), before);
    }

    #[test]
    fn test_failures_are_aggregated() {
        let (dir, targets) = project();
        fs::write(&targets.services, "framework:\n    secret: s3cr3t\n").unwrap();
        fs::remove_file(&targets.routing).unwrap();

        let report = Workflow::new(dir.path(), targets.clone()).register(&bundle(false));
        assert!(!report.is_complete());
        assert!(report.steps[0].is_done());

        let summary = report.summary().join("\n");
        assert!(summary.starts_with(MANUAL_MESSAGE));
        assert!(summary.contains("\n    AcmeBlogBundle:\n"));
        assert!(summary.contains("@AcmeBlogBundle/Resources/config/services.yml"));
        // Paths in instructions are relative to the project root
        assert!(!summary.contains(&dir.path().display().to_string()));
    }

    #[test]
    fn test_missing_kernel_uses_fallback_instruction() {
        let (dir, targets) = project();
        fs::remove_file(&targets.kernel).unwrap();

        let report = Workflow::new(dir.path(), targets).register(&bundle(false));
        let follow_up = report.steps[0].follow_up().join("\n");
        assert!(follow_up.contains("AppKernel::registerBundles()"));
        assert!(follow_up.contains("    new Acme\\BlogBundle\\AcmeBlogBundle(),"));
    }

    #[test]
    fn test_dry_run_leaves_disk_untouched() {
        let (dir, targets) = project();
        let dry = DryRunFs::new(LocalFs);
        let before = fs::read_to_string(&targets.kernel).unwrap();

        let report = Workflow::with_fs(dir.path(), targets.clone(), &dry).register(&bundle(false));
        assert!(report.is_complete());
        assert_eq!(dry.writes().len(), 3);
        assert_eq!(fs::read_to_string(&targets.kernel).unwrap(), before);
    }
}
