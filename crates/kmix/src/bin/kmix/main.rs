mod cli;

use kmix::loader::FsLoader;
use kmix::release::ReleaseId;
use kmix::render::{self, Format};
use kmix::resolver::{ValueRequest, ValueResolver};
use kmix::runner::MixerRunner;
use kmix::script::Mixfile;
use kmix::state::{BackendKind, ConfigMapBackend, MemoryBackend, StateBackend};
use kmix::tree::{DocumentSet, ValueTree};

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    let default_directive = if cli.verbose { "kmix=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("KMIX_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Template(template_cli) => template(template_cli),
        cli::Command::Values(values_cli) => values(values_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn template(cli: cli::TemplateCommand) -> anyhow::Result<()> {
    let release = ReleaseId::from(cli.values.release.as_str());
    let mixfile = Mixfile::load(&cli.values.mixfile)?;
    let backend = state_backend(&cli.state);

    let values = resolve(&release, &cli.values, &cli.state, backend.as_ref(), mixfile.defaults)?;

    let runner: MixerRunner = mixfile.mixers.into_iter().collect();
    let documents = runner.run_all(&values, &release)?;
    output(&documents, cli.output.format.into())?;

    if cli.write_state {
        backend.write(&release, &cli.state.namespace, &values)?;
        tracing::info!(%release, namespace = %cli.state.namespace, "state written");
    }

    Ok(())
}

pub fn values(cli: cli::ValuesCommand) -> anyhow::Result<()> {
    let release = ReleaseId::from(cli.values.release.as_str());
    let mixfile = Mixfile::load(&cli.values.mixfile)?;
    let backend = state_backend(&cli.state);

    let values = resolve(&release, &cli.values, &cli.state, backend.as_ref(), mixfile.defaults)?;
    output(&DocumentSet::from(vec![values]), cli.output.format.into())
}

fn state_backend(state: &cli::StateArgs) -> Box<dyn StateBackend> {
    match BackendKind::from(state.backend) {
        BackendKind::ConfigMap => Box::new(ConfigMapBackend::new(state.state_dir.clone())),
        BackendKind::Memory => Box::new(MemoryBackend::default()),
    }
}

fn resolve(
    release: &ReleaseId,
    values: &cli::ValueArgs,
    state: &cli::StateArgs,
    backend: &dyn StateBackend,
    defaults: ValueTree,
) -> anyhow::Result<ValueTree> {
    let resolver = ValueResolver::new(FsLoader::from_workdir()?);
    let request = ValueRequest {
        defaults,
        state: None,
        file_exprs: values.files.clone(),
        inline_exprs: values.inline.clone(),
    };

    let values = if state.read_state {
        resolver.resolve_seeded(release, backend, &state.namespace, request)?
    } else {
        resolver.resolve(release, &request)?
    };

    Ok(values)
}

fn output(documents: &DocumentSet, format: Format) -> anyhow::Result<()> {
    let rendered = render::render(documents, format)?;
    match format {
        Format::Yaml => print!("{rendered}"),
        Format::Json => println!("{rendered}"),
    }

    Ok(())
}
