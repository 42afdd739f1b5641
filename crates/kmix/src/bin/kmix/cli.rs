//! kmix cli interface

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; kmix ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    /// Log debug output to stderr (KMIX_LOG takes precedence)
    #[clap(short = 'v', long = "verbose", global(true))]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render the documents of a release
    #[command(alias = "t")]
    Template(TemplateCommand),

    /// Print the resolved values of a release
    Values(ValuesCommand),
}

#[derive(Parser, Debug)]
pub struct TemplateCommand {
    #[clap(flatten)]
    pub values: ValueArgs,

    #[clap(flatten)]
    pub state: StateArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Write the resolved values to the state backend after a successful run
    #[clap(long = "write-state")]
    pub write_state: bool,
}

#[derive(Parser, Debug)]
pub struct ValuesCommand {
    #[clap(flatten)]
    pub values: ValueArgs,

    #[clap(flatten)]
    pub state: StateArgs,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct ValueArgs {
    /// Name of the release
    pub release: String,

    /// Mixfile declaring defaults and mixers
    #[clap(short = 'm', long = "mixfile", default_value = "mixfile.yaml")]
    pub mixfile: PathBuf,

    /// Values file (YAML, JSON or HCL), later files win
    #[clap(short = 'f', long = "values")]
    pub files: Vec<String>,

    /// Inline value assignment such as `image.tag=1.2`, applied after all files
    #[clap(long = "set")]
    pub inline: Vec<String>,
}

#[derive(Args, Debug)]
pub struct StateArgs {
    /// Namespace the release state lives in
    #[clap(short = 'n', long = "namespace", default_value = "default")]
    pub namespace: String,

    /// Seed the values with the state stored for this release
    #[clap(long = "read-state")]
    pub read_state: bool,

    /// Where release state is kept
    #[arg(long = "state-backend", default_value_t)]
    pub backend: StateBackendKind,

    /// Directory of the configmap state backend
    #[clap(long = "state-dir", default_value = ".kmix/state")]
    pub state_dir: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Default, Debug)]
pub enum StateBackendKind {
    /// ConfigMap manifests below --state-dir
    #[default]
    Configmap,
    /// Kept for the duration of the command only
    Memory,
}

impl std::fmt::Display for StateBackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StateBackendKind::Configmap => f.write_str("configmap"),
            StateBackendKind::Memory => f.write_str("memory"),
        }
    }
}

impl From<StateBackendKind> for kmix::state::BackendKind {
    fn from(value: StateBackendKind) -> Self {
        match value {
            StateBackendKind::Configmap => kmix::state::BackendKind::ConfigMap,
            StateBackendKind::Memory => kmix::state::BackendKind::Memory,
        }
    }
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    #[arg(short = 'o', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

impl From<OutputFormat> for kmix::render::Format {
    fn from(value: OutputFormat) -> Self {
        match value {
            OutputFormat::Json => kmix::render::Format::Json,
            OutputFormat::Yaml => kmix::render::Format::Yaml,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use kmix::state::BackendKind;

    #[test]
    fn cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn state_backend_option() {
        let cli = Cli::try_parse_from(["kmix", "template", "web"]).unwrap();
        let Command::Template(template) = cli.command else {
            panic!("expected template command");
        };
        assert_eq!(BackendKind::from(template.state.backend), BackendKind::ConfigMap);

        let cli =
            Cli::try_parse_from(["kmix", "values", "web", "--state-backend", "memory"]).unwrap();
        let Command::Values(values) = cli.command else {
            panic!("expected values command");
        };
        assert_eq!(BackendKind::from(values.state.backend), BackendKind::Memory);

        assert!(Cli::try_parse_from(["kmix", "values", "web", "--state-backend", "s3"]).is_err());
    }
}
