use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use tenant_l10n::interchange::TranslationRecord;
use tenant_l10n::seed::load_descriptors;
use tenant_l10n::{
    AdminService, AppConfig, EntryFilter, LocalizerFactory, Seeder, TenantScope, open_store,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let culture = || {
        Arg::new("culture")
            .long("culture")
            .short('c')
            .help("Culture to use (default: configured default culture)")
    };
    let tenant = || {
        Arg::new("tenant")
            .long("tenant")
            .short('t')
            .help("Tenant id (default: configured tenant, else global)")
    };
    let format = || {
        Arg::new("format")
            .long("format")
            .short('f')
            .value_parser(["csv", "json"])
            .help("Interchange format")
    };

    Command::new("tenant-l10n")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Manage and query database-backed translations")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Config file (default: $TENANT_L10N_CONFIG, else l10n.toml)"),
        )
        .subcommand(Command::new("init").about("Create the database schema"))
        .subcommand(
            Command::new("get")
                .about("Resolve one key")
                .arg(Arg::new("key").required(true).index(1))
                .arg(culture())
                .arg(tenant())
                .arg(
                    Arg::new("arg")
                        .long("arg")
                        .short('a')
                        .action(ArgAction::Append)
                        .help("Positional argument for {0}, {1}, ..."),
                ),
        )
        .subcommand(
            Command::new("all")
                .about("Print every string visible in a culture")
                .arg(culture())
                .arg(tenant())
                .arg(
                    Arg::new("no-parents")
                        .long("no-parents")
                        .action(ArgAction::SetTrue)
                        .help("Only the requested culture, no parent cultures"),
                ),
        )
        .subcommand(
            Command::new("seed")
                .about("Create keys and default values from field descriptors")
                .arg(
                    Arg::new("fields")
                        .long("fields")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("JSON file with an array of field descriptors"),
                )
                .arg(culture().action(ArgAction::Append))
                .arg(tenant())
                .arg(
                    Arg::new("overwrite")
                        .long("overwrite")
                        .action(ArgAction::SetTrue)
                        .help("Replace existing values with generated defaults"),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export translations")
                .arg(format().default_value("csv"))
                .arg(
                    tenant()
                        .help("Only this tenant's rows")
                        .conflicts_with("global"),
                )
                .arg(
                    Arg::new("global")
                        .long("global")
                        .action(ArgAction::SetTrue)
                        .help("Only global rows"),
                )
                .arg(culture().help("Only this culture"))
                .arg(
                    Arg::new("search")
                        .long("search")
                        .short('s')
                        .help("Only rows whose key or value contains this text"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("Write to a file instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Import translations, updating rows that already exist")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .index(1)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(format().help("Interchange format (default: from the file extension)"))
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Print the normalized rows without writing them"),
                ),
        )
}

fn inferred_format(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => "json",
        _ => "csv",
    }
}

fn tenant_arg(matches: &ArgMatches, config: &AppConfig) -> TenantScope {
    let tenant = matches
        .get_one::<String>("tenant")
        .map(String::as_str)
        .or(config.localization.tenant_id.as_deref());
    TenantScope::from_option(tenant)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let config = AppConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    let options = config.localization.clone();
    let store = open_store(&config).await?;

    match matches.subcommand() {
        Some(("init", _)) => {
            info!(provider = options.provider.as_str(), "store ready");
        }
        Some(("get", sub)) => {
            let key = sub
                .get_one::<String>("key")
                .ok_or("missing key argument")?;
            let culture = sub
                .get_one::<String>("culture")
                .cloned()
                .unwrap_or_else(|| options.default_culture.clone());
            let args: Vec<String> = sub
                .get_many::<String>("arg")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();

            let localizer = LocalizerFactory::new(store, options.clone())
                .create_for_culture("cli", &culture)
                .with_tenant(tenant_arg(sub, &config).tenant_id());
            let localized = localizer.get_with_args(key, &args).await?;
            println!("{}", localized);
            if localized.resource_not_found {
                std::process::exit(1);
            }
        }
        Some(("all", sub)) => {
            let culture = sub
                .get_one::<String>("culture")
                .cloned()
                .unwrap_or_else(|| options.default_culture.clone());
            let localizer = LocalizerFactory::new(store, options.clone())
                .create_for_culture("cli", &culture)
                .with_tenant(tenant_arg(sub, &config).tenant_id());
            for string in localizer.get_all_strings(!sub.get_flag("no-parents")).await? {
                println!("{} = {}", string.name, string.value);
            }
        }
        Some(("seed", sub)) => {
            let path = sub
                .get_one::<PathBuf>("fields")
                .ok_or("missing --fields")?;
            let descriptors = load_descriptors(&std::fs::read_to_string(path)?)?;
            let cultures: Vec<String> = match sub.get_many::<String>("culture") {
                Some(values) => values.cloned().collect(),
                None => options.seed_cultures(),
            };
            let report = Seeder::new(store)
                .seed(
                    &descriptors,
                    &cultures,
                    &tenant_arg(sub, &config),
                    sub.get_flag("overwrite"),
                )
                .await?;
            println!(
                "keys created: {}, values inserted: {}, values updated: {}",
                report.keys_created, report.values_inserted, report.values_updated
            );
        }
        Some(("export", sub)) => {
            let tenant = if sub.get_flag("global") {
                Some(TenantScope::Global)
            } else {
                sub.get_one::<String>("tenant")
                    .map(|t| TenantScope::from_option(Some(t)))
            };
            let filter = EntryFilter::from_parts(
                tenant,
                sub.get_one::<String>("culture").map(String::as_str),
                sub.get_one::<String>("search").map(String::as_str),
            );
            let admin = AdminService::new(store, options);
            let rendered = match sub.get_one::<String>("format").map(String::as_str) {
                Some("json") => admin.export_json(&filter).await?,
                _ => admin.export_csv(&filter).await?,
            };
            match sub.get_one::<PathBuf>("output") {
                Some(path) => {
                    std::fs::write(path, rendered)?;
                    info!(path = %path.display(), "export written");
                }
                None => print!("{}", rendered),
            }
        }
        Some(("import", sub)) => {
            let path = sub.get_one::<PathBuf>("file").ok_or("missing file")?;
            let format = sub
                .get_one::<String>("format")
                .map(String::as_str)
                .unwrap_or_else(|| inferred_format(path));
            let text = std::fs::read_to_string(path)?;
            let admin = AdminService::new(store, options);

            if sub.get_flag("dry-run") {
                let preview: Vec<TranslationRecord> = match format {
                    "json" => admin.preview_json(&text)?,
                    _ => admin.preview_csv(&text),
                };
                for row in &preview {
                    println!(
                        "{}\t{}\t{}\t{}",
                        row.key,
                        row.culture,
                        row.tenant_id.as_deref().unwrap_or("-"),
                        row.value
                    );
                }
                println!("{} rows would be imported", preview.len());
                return Ok(());
            }
            let applied = match format {
                "json" => admin.import_json(&text).await?,
                _ => admin.import_csv(&text).await?,
            };
            println!("{} rows imported", applied);
        }
        _ => unreachable!("subcommand_required is set"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_inferred_format() {
        assert_eq!(inferred_format(Path::new("dump.JSON")), "json");
        assert_eq!(inferred_format(Path::new("dump.csv")), "csv");
        assert_eq!(inferred_format(Path::new("dump")), "csv");
    }

    #[test]
    fn test_parse_get() {
        let matches = cli()
            .try_get_matches_from(["tenant-l10n", "get", "Hello", "-c", "fr", "-a", "x", "-a", "y"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "get");
        let args: Vec<&String> = sub.get_many::<String>("arg").unwrap().collect();
        assert_eq!(args, ["x", "y"]);
    }
}
