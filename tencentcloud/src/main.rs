use std::env;
use std::process::ExitCode;
use tencentcloud::{FamilyRegistry, ProviderConfig, StateService};

const USAGE: &str =
    "usage: tencentcloud-wait <family> <resource-id>\n       tencentcloud-wait --families";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    ListFamilies,
    Wait { kind: String, id: String },
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Option<Command> {
    let command = match (args.next(), args.next()) {
        (Some(flag), None) if flag == "--families" => Command::ListFamilies,
        (Some(kind), Some(id)) if !kind.starts_with("--") => Command::Wait { kind, id },
        _ => return None,
    };
    args.next().is_none().then_some(command)
}

fn log_level() -> tracing::Level {
    env::var("TENCENTCLOUD_LOG")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(tracing::Level::INFO)
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_max_level(log_level())
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = parse_args(env::args().skip(1)) else {
        eprintln!("{}", USAGE);
        return Ok(ExitCode::from(2));
    };

    match command {
        Command::ListFamilies => {
            // listing needs no credentials, only the optional families file
            let families_file = ProviderConfig::families_file_from_env();
            let registry = FamilyRegistry::with_overrides(families_file.as_deref())?;
            for kind in registry.kinds() {
                println!("{}", kind);
            }
        }
        Command::Wait { kind, id } => {
            let service = StateService::from_config(ProviderConfig::from_env()?)?;
            let state = service.wait_for(&kind, &id).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Option<Command> {
        parse_args(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn parses_family_listing() {
        assert_eq!(parse(&["--families"]), Some(Command::ListFamilies));
        assert_eq!(parse(&["--families", "extra"]), None);
    }

    #[test]
    fn parses_wait_target() {
        assert_eq!(
            parse(&["cvm_instance", "ins-1"]),
            Some(Command::Wait {
                kind: "cvm_instance".to_string(),
                id: "ins-1".to_string(),
            })
        );
    }

    #[test]
    fn rejects_missing_or_extra_arguments() {
        assert_eq!(parse(&[]), None);
        assert_eq!(parse(&["cvm_instance"]), None);
        assert_eq!(parse(&["cvm_instance", "ins-1", "ins-2"]), None);
        assert_eq!(parse(&["--help", "ins-1"]), None);
    }
}
