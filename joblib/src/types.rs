use serde::Deserialize;
use uuid::Uuid;

pub type Program = String;
pub type Args = Vec<String>;
pub type Dir = String;
pub type Envs = Vec<(String, String)>;
pub type JobId = Uuid;
pub type OutputBlob = bytes::Bytes;
/// A program and its arguments, run to clean up after a killed job.
pub type StopCommand = (Program, Args);

/// Default entrypoint for jobs that do not name one.
pub const DEFAULT_ENTRYPOINT: &str = "/bin/sh";

/// A declared unit of work: run `entrypoint args...` inside `image`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub name: String,
    pub image: String,
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
    #[serde(default)]
    pub args: Args,
}

fn default_entrypoint() -> String {
    DEFAULT_ENTRYPOINT.to_string()
}

impl JobSpec {
    pub fn new(
        name: impl Into<String>,
        image: impl Into<String>,
        entrypoint: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            entrypoint: entrypoint.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}
