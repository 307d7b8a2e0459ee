use std::path::PathBuf;

use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use dragon_cfg::Registry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dragon-cfg")]
#[command(about = "Inspect layered application configuration", long_about = None)]
struct Cli {
    /// Directory holding app.conf, model.conf and env.<env>.conf
    #[arg(short, long, default_value = "config")]
    dir: PathBuf,

    /// Apply overrides from environment variables with this prefix
    #[arg(long)]
    env_prefix: Option<String>,

    /// Separator between path segments in override variable names
    #[arg(long, default_value = "__", value_parser = NonEmptyStringValueParser::new())]
    env_separator: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the whole configuration with references resolved
    Dump {
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Print a single value
    Get {
        section: String,
        key: String,
        #[arg(long = "as", value_enum, default_value_t = Kind::Text)]
        kind: Kind,
    },
    /// Print the environment tag
    Env,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Toml,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Text,
    Int,
    Long,
    Bool,
    Array,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dragon_cfg=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut builder = Registry::builder().with_dir(&cli.dir);
    if let Some(prefix) = cli.env_prefix {
        builder = builder.with_env(prefix, cli.env_separator);
    }
    let registry = builder.build()?;

    match cli.command {
        Commands::Dump { format } => {
            let document = registry.to_document()?;
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&document)?),
                Format::Toml => print!("{}", toml::to_string_pretty(&document)?),
            }
        }
        Commands::Get { section, key, kind } => {
            let section = Some(section.as_str());
            let rendered = match kind {
                Kind::Text => registry.get(section, &key)?,
                Kind::Int => registry.get_int(section, &key)?.map(|n| n.to_string()),
                Kind::Long => registry.get_long(section, &key)?.map(|n| n.to_string()),
                Kind::Bool => registry.get_bool(section, &key)?.map(|b| b.to_string()),
                Kind::Array => registry
                    .get_array(section, &key)?
                    .map(|items| serde_json::to_string(&items))
                    .transpose()?,
            };
            match rendered {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("Error: no value at {}.{}", section.unwrap_or_default(), key);
                    std::process::exit(1);
                }
            }
        }
        Commands::Env => println!("{}", registry.environment()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_empty_separator_rejected() {
        let result = Cli::try_parse_from(["dragon-cfg", "--env-prefix", "APP", "--env-separator", "", "env"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_get_arguments() {
        let cli = Cli::try_parse_from(["dragon-cfg", "--dir", "conf", "get", "server", "port", "--as", "int"])
            .unwrap();

        assert_eq!(cli.dir, PathBuf::from("conf"));
        assert_eq!(cli.env_separator, "__");
        assert!(matches!(
            cli.command,
            Commands::Get { ref section, ref key, kind: Kind::Int } if section == "server" && key == "port"
        ));
    }
}
