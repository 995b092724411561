use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::docx::document::Rgb;
use crate::filler::{FillOptions, TableRole};

pub const CONFIG_FILENAME: &str = "report-filler.toml";
pub const CONFIG_ENV: &str = "REPORT_FILLER_CONFIG";

pub const DEFAULT_TEMPLATE: &str = "files/template.docx";
pub const DEFAULT_DATA: &str = "files/data_text.txt";
pub const DEFAULT_OUTPUT: &str = "output.docx";

const DEFAULT_CONFIG_TOML: &str = r#"# report-filler configuration.
# Relative paths are resolved against the directory holding this file.

[paths]
template = "files/template.docx"
data = "files/data_text.txt"
output = "output.docx"

[markers]
# Run texts (trimmed) blanked wherever they appear.
removal_list = [
  "[ as bullets ]",
  "database.db.name",
  "database.db.link",
  "Search Strategy",
  "Search Terms SoTA",
  "Search Terms S&P",
  "{{ for item in database.sota_terms }}",
  "{{ for item in database.sp_terms }}",
]
# Marker expressions rendered as nothing.
stray_tokens = [
  "item in database.sota_terms",
  "item in database.sp_terms",
  "database.db.name",
  "database.db.link",
]
section_header = "Scientific Databases"
date_format = "%b %d, %Y"

[style]
list_style = "List Bullet"
heading_color = "548DD4"

[[tables]]
header = "Criteria"
data_key = "suitability_table"
columns = 2

[[tables]]
header = "Suitability Criteria"
data_key = "suitability_criteria_table"
columns = 3
"#;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub markers: MarkersSection,
    #[serde(default)]
    pub style: StyleSection,
    /// Table roles; when absent the built-in `Criteria` / `Suitability Criteria` roles apply.
    #[serde(default)]
    pub tables: Option<Vec<TableRole>>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PathsSection {
    #[serde(default)]
    pub template: Option<PathBuf>,
    #[serde(default)]
    pub data: Option<PathBuf>,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct MarkersSection {
    #[serde(default)]
    pub removal_list: Option<Vec<String>>,
    #[serde(default)]
    pub stray_tokens: Option<Vec<String>>,
    #[serde(default)]
    pub section_header: Option<String>,
    /// strftime-style pattern for `{{ date }}`.
    #[serde(default)]
    pub date_format: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct StyleSection {
    #[serde(default)]
    pub list_style: Option<String>,
    /// Six hex digits, e.g. `548DD4`.
    #[serde(default)]
    pub heading_color: Option<String>,
}

/// Values given on the command line. They win over the config file.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub data: Option<PathBuf>,
    pub output: Option<PathBuf>,
    /// `YYYY-MM-DD`; today when absent.
    pub date: Option<String>,
    pub strict: bool,
}

/// Everything a fill run needs, fully resolved.
#[derive(Clone, Debug)]
pub struct FillerConfig {
    pub template: PathBuf,
    pub data: PathBuf,
    pub output: PathBuf,
    pub strict: bool,
    pub options: FillOptions,
    pub config_path: Option<PathBuf>,
}

impl FillerConfig {
    /// Locates and loads the config file (explicit path, then `$REPORT_FILLER_CONFIG`, then a
    /// `report-filler.toml` search) and layers the command line on top.
    pub fn resolve(cli: CliOverrides) -> anyhow::Result<Self> {
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(|| find_default_config(CONFIG_FILENAME));
        let cfg = match &config_path {
            Some(p) => load_config(p)?,
            None => AppConfig::default(),
        };
        let base_dir = config_path.as_deref().and_then(Path::parent);
        let mut resolved = Self::from_parts(&cfg, base_dir, cli)?;
        resolved.config_path = config_path;
        Ok(resolved)
    }

    pub fn from_parts(
        cfg: &AppConfig,
        base_dir: Option<&Path>,
        cli: CliOverrides,
    ) -> anyhow::Result<Self> {
        let from_file = |p: &Option<PathBuf>, default: &str| -> PathBuf {
            match p {
                Some(p) if p.is_relative() => match base_dir {
                    Some(dir) => dir.join(p),
                    None => p.clone(),
                },
                Some(p) => p.clone(),
                None => PathBuf::from(default),
            }
        };
        let template = cli
            .template
            .unwrap_or_else(|| from_file(&cfg.paths.template, DEFAULT_TEMPLATE));
        let data = cli
            .data
            .unwrap_or_else(|| from_file(&cfg.paths.data, DEFAULT_DATA));
        let output = cli
            .output
            .unwrap_or_else(|| from_file(&cfg.paths.output, DEFAULT_OUTPUT));

        let mut options = FillOptions::default();
        if let Some(list) = &cfg.markers.removal_list {
            options.removal_list = list.clone();
        }
        if let Some(tokens) = &cfg.markers.stray_tokens {
            options.stray_tokens = tokens.clone();
        }
        if let Some(header) = &cfg.markers.section_header {
            options.section_header = header.clone();
        }
        if let Some(fmt) = &cfg.markers.date_format {
            validate_date_format(fmt)?;
            options.date_format = fmt.clone();
        }
        if let Some(style) = &cfg.style.list_style {
            options.list_style = style.clone();
        }
        if let Some(color) = &cfg.style.heading_color {
            options.heading_color = Rgb::from_hex(color).context("style.heading_color")?;
        }
        if let Some(roles) = &cfg.tables {
            if let Some(bad) = roles.iter().find(|r| r.columns == 0) {
                return Err(anyhow!("table role {:?} must fill at least one column", bad.header));
            }
            options.table_roles = roles.clone();
        }
        if let Some(date) = cli.date.as_deref() {
            options.date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
                .with_context(|| format!("--date expects YYYY-MM-DD, got {date:?}"))?;
        }

        Ok(Self {
            template,
            data,
            output,
            strict: cli.strict,
            options,
            config_path: None,
        })
    }
}

fn validate_date_format(fmt: &str) -> anyhow::Result<()> {
    if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        return Err(anyhow!("markers.date_format is not a valid format: {fmt:?}"));
    }
    Ok(())
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

/// Searches upwards from the working directory, then from the executable's directory.
pub fn find_default_config(filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 4) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

/// Writes the default `report-filler.toml` into `dir`. An existing file is kept unless `force`.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use chrono::NaiveDate;

    use super::{
        init_default_config, load_config, AppConfig, CliOverrides, FillerConfig, DEFAULT_DATA,
        DEFAULT_OUTPUT, DEFAULT_TEMPLATE,
    };
    use crate::docx::document::Rgb;
    use crate::filler::FillOptions;

    #[test]
    fn defaults_without_config() {
        let cfg = FillerConfig::from_parts(&AppConfig::default(), None, CliOverrides::default())
            .expect("resolve");
        assert_eq!(cfg.template, PathBuf::from(DEFAULT_TEMPLATE));
        assert_eq!(cfg.data, PathBuf::from(DEFAULT_DATA));
        assert_eq!(cfg.output, PathBuf::from(DEFAULT_OUTPUT));
        assert!(!cfg.strict);
        let defaults = FillOptions::default();
        assert_eq!(cfg.options.removal_list, defaults.removal_list);
        assert_eq!(cfg.options.table_roles, defaults.table_roles);
    }

    #[test]
    fn generated_config_matches_builtin_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = init_default_config(dir.path(), false).expect("init");
        let cfg = load_config(&path).expect("load");
        let resolved =
            FillerConfig::from_parts(&cfg, path.parent(), CliOverrides::default()).expect("resolve");
        let defaults = FillOptions::default();
        assert_eq!(resolved.options.removal_list, defaults.removal_list);
        assert_eq!(resolved.options.stray_tokens, defaults.stray_tokens);
        assert_eq!(resolved.options.section_header, defaults.section_header);
        assert_eq!(resolved.options.date_format, defaults.date_format);
        assert_eq!(resolved.options.list_style, defaults.list_style);
        assert_eq!(resolved.options.heading_color, defaults.heading_color);
        assert_eq!(resolved.options.table_roles, defaults.table_roles);
        assert_eq!(resolved.template, dir.path().join(DEFAULT_TEMPLATE));
    }

    #[test]
    fn init_keeps_existing_file_unless_forced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report-filler.toml");
        std::fs::write(&path, "# mine\n").expect("write");
        init_default_config(dir.path(), false).expect("init");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "# mine\n");
        init_default_config(dir.path(), true).expect("init forced");
        assert!(std::fs::read_to_string(&path).expect("read").contains("[paths]"));
    }

    #[test]
    fn cli_wins_over_file_and_relative_paths_follow_config_dir() {
        let cfg: AppConfig = toml::from_str(
            r##"
            [paths]
            template = "t.docx"
            data = "/abs/data.json"
            output = "out/report.docx"
            [style]
            heading_color = "#102030"
            "##,
        )
        .expect("toml");
        let cli = CliOverrides {
            output: Some(PathBuf::from("cli.docx")),
            date: Some("2024-01-05".to_string()),
            strict: true,
            ..CliOverrides::default()
        };
        let resolved = FillerConfig::from_parts(&cfg, Some(Path::new("/cfg")), cli).expect("resolve");
        assert_eq!(resolved.template, PathBuf::from("/cfg/t.docx"));
        assert_eq!(resolved.data, PathBuf::from("/abs/data.json"));
        assert_eq!(resolved.output, PathBuf::from("cli.docx"));
        assert_eq!(resolved.options.heading_color, Rgb(0x10, 0x20, 0x30));
        assert_eq!(resolved.options.date, NaiveDate::from_ymd_opt(2024, 1, 5).expect("date"));
        assert!(resolved.strict);
    }

    #[test]
    fn rejects_bad_values() {
        let bad_date = CliOverrides {
            date: Some("05/01/2024".to_string()),
            ..CliOverrides::default()
        };
        assert!(FillerConfig::from_parts(&AppConfig::default(), None, bad_date).is_err());

        let bad_color: AppConfig = toml::from_str("[style]\nheading_color = \"blue\"").expect("toml");
        assert!(FillerConfig::from_parts(&bad_color, None, CliOverrides::default()).is_err());

        let zero_cols: AppConfig =
            toml::from_str("[[tables]]\nheader = \"X\"\ndata_key = \"x\"\ncolumns = 0").expect("toml");
        assert!(FillerConfig::from_parts(&zero_cols, None, CliOverrides::default()).is_err());
    }
}
