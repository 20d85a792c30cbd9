//! Pipeline definitions: the built-in Terraform checks, or a TOML file of `[[job]]` tables.

use crate::error::{Error, Result};
use crate::types::JobSpec;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub const TERRAFORM_IMAGE: &str = "hashicorp/terraform:1.0.8";
pub const TFLINT_IMAGE: &str = "ghcr.io/terraform-linters/tflint-bundle:latest";
pub const FMT_OK_MESSAGE: &str = "terraform fmt has been checked, everything is good";

const VALIDATE_SCRIPT: &str = "set -o pipefail
terraform init -backend=false -force-copy -no-color > /dev/null
terraform validate -no-color";

const LINT_SCRIPT: &str = "set -o pipefail
tflint --init
tflint";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pipeline {
    jobs: Vec<JobSpec>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineFile {
    #[serde(default, rename = "job")]
    jobs: Vec<JobSpec>,
}

impl Pipeline {
    /// Build a pipeline, checking that every job is runnable and names are unique.
    pub fn new(jobs: Vec<JobSpec>) -> Result<Self> {
        if jobs.is_empty() {
            return Err(Error::InvalidPipeline("no jobs declared".into()));
        }
        let mut names = HashSet::new();
        for job in &jobs {
            validate_job(job)?;
            if !names.insert(job.name.as_str()) {
                return Err(Error::InvalidPipeline(format!(
                    "job name '{}' is declared more than once",
                    job.name
                )));
            }
        }
        Ok(Self { jobs })
    }

    /// The Terraform validate / fmt / lint checks.
    pub fn terraform() -> Self {
        let sh = |name: &str, image: &str, script: String| {
            JobSpec::new(name, image, "/bin/sh", ["-ec".to_string(), script])
        };
        Self {
            jobs: vec![
                sh("TF - Validate", TERRAFORM_IMAGE, VALIDATE_SCRIPT.into()),
                sh(
                    "TF - Fmt",
                    TERRAFORM_IMAGE,
                    format!(
                        "terraform fmt -check -recursive -diff && echo {}",
                        FMT_OK_MESSAGE
                    ),
                ),
                sh("TF - Lint", TFLINT_IMAGE, LINT_SCRIPT.into()),
            ],
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: PipelineFile = toml::from_str(contents)?;
        Self::new(file.jobs)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ReadPipeline {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|err| match err {
            Error::Toml(source) => Error::ParsePipeline {
                path: path.to_path_buf(),
                source,
            },
            err => err,
        })
    }

    pub fn jobs(&self) -> &[JobSpec] {
        &self.jobs
    }

    pub fn get(&self, name: &str) -> Option<&JobSpec> {
        self.jobs.iter().find(|job| job.name == name)
    }

    /// Keep only the named jobs, preserving declaration order. An empty selection keeps everything.
    pub fn select(self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }
        if let Some(unknown) = names.iter().find(|name| self.get(name).is_none()) {
            return Err(Error::UnknownJob(unknown.clone()));
        }
        let jobs = self
            .jobs
            .into_iter()
            .filter(|job| names.contains(&job.name))
            .collect();
        Ok(Self { jobs })
    }
}

pub(crate) fn validate_job(job: &JobSpec) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidJob {
        job_name: job.name.clone(),
        reason: reason.into(),
    };
    if job.name.trim().is_empty() {
        return Err(invalid("name must not be blank"));
    }
    if job.image.trim().is_empty() {
        return Err(invalid("image must not be blank"));
    }
    if job.entrypoint.trim().is_empty() {
        return Err(invalid("entrypoint must not be blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terraform_pipeline_is_valid() {
        let pipeline = Pipeline::terraform();
        assert_eq!(Pipeline::new(pipeline.jobs().to_vec()).unwrap(), pipeline);
        let names: Vec<_> = pipeline.jobs().iter().map(|job| job.name.as_str()).collect();
        assert_eq!(names, ["TF - Validate", "TF - Fmt", "TF - Lint"]);
    }

    #[test]
    fn terraform_jobs_run_shell_scripts() {
        let pipeline = Pipeline::terraform();

        let validate = pipeline.get("TF - Validate").unwrap();
        assert_eq!(validate.image, "hashicorp/terraform:1.0.8");
        assert_eq!(validate.entrypoint, "/bin/sh");
        assert_eq!(
            validate.args,
            [
                "-ec",
                "set -o pipefail\n\
                 terraform init -backend=false -force-copy -no-color > /dev/null\n\
                 terraform validate -no-color"
            ]
        );

        let fmt = pipeline.get("TF - Fmt").unwrap();
        assert_eq!(fmt.image, "hashicorp/terraform:1.0.8");
        assert_eq!(
            fmt.args,
            [
                "-ec",
                "terraform fmt -check -recursive -diff && echo terraform fmt has been checked, everything is good"
            ]
        );

        let lint = pipeline.get("TF - Lint").unwrap();
        assert_eq!(lint.image, "ghcr.io/terraform-linters/tflint-bundle:latest");
        assert_eq!(lint.args, ["-ec", "set -o pipefail\ntflint --init\ntflint"]);
    }

    #[test]
    fn parse_toml_with_defaults() {
        let pipeline = Pipeline::from_toml(
            r#"
            [[job]]
            name = "plan"
            image = "hashicorp/terraform:1.0.8"
            args = ["-ec", "terraform plan"]

            [[job]]
            name = "version"
            image = "hashicorp/terraform:1.0.8"
            entrypoint = "terraform"
            "#,
        )
        .unwrap();
        assert_eq!(
            pipeline.jobs(),
            [
                JobSpec::new(
                    "plan",
                    "hashicorp/terraform:1.0.8",
                    "/bin/sh",
                    ["-ec", "terraform plan"]
                ),
                JobSpec::new(
                    "version",
                    "hashicorp/terraform:1.0.8",
                    "terraform",
                    Vec::<String>::new()
                ),
            ]
        );
    }

    #[test]
    fn rejects_duplicate_names() {
        let job = JobSpec::new("lint", "img", "/bin/sh", ["-c", "true"]);
        assert!(matches!(
            Pipeline::new(vec![job.clone(), job]),
            Err(Error::InvalidPipeline(_))
        ));
    }

    #[test]
    fn rejects_blank_fields_and_empty_pipelines() {
        assert!(matches!(
            Pipeline::new(vec![]),
            Err(Error::InvalidPipeline(_))
        ));
        assert!(matches!(
            Pipeline::new(vec![JobSpec::new("a", " ", "/bin/sh", ["true"])]),
            Err(Error::InvalidJob { .. })
        ));
        assert!(matches!(
            Pipeline::new(vec![JobSpec::new("", "img", "/bin/sh", ["true"])]),
            Err(Error::InvalidJob { .. })
        ));
        assert!(matches!(
            Pipeline::new(vec![JobSpec::new("a", "img", "", ["true"])]),
            Err(Error::InvalidJob { .. })
        ));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = Pipeline::from_toml(
            r#"
            [[job]]
            name = "a"
            image = "img"
            command = "oops"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "[[job]]\nname = 1\n").unwrap();
        match Pipeline::load(&path) {
            Err(Error::ParsePipeline { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            Pipeline::load(&dir.path().join("missing.toml")),
            Err(Error::ReadPipeline { .. })
        ));
    }

    #[test]
    fn select_keeps_declaration_order() {
        let pipeline = Pipeline::terraform()
            .select(&["TF - Lint".to_string(), "TF - Validate".to_string()])
            .unwrap();
        let names: Vec<_> = pipeline.jobs().iter().map(|job| job.name.as_str()).collect();
        assert_eq!(names, ["TF - Validate", "TF - Lint"]);

        assert!(matches!(
            Pipeline::terraform().select(&["nope".to_string()]),
            Err(Error::UnknownJob(name)) if name == "nope"
        ));
        assert_eq!(
            Pipeline::terraform().select(&[]).unwrap(),
            Pipeline::terraform()
        );
    }
}
