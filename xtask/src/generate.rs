use std::path::PathBuf;
use std::process::Command;

use clap::{Args, ValueEnum};
use regional_stack_core::compose::{FanOutConfig, NamingScope, DEFAULT_TEMPLATE_KEY};
use regional_stack_core::document::{
    HandlerSettings, DEFAULT_CODE_KEY, DEFAULT_HANDLER_TIMEOUT_SECS, DEFAULT_RUNTIME,
};
use regional_stack_core::region::{
    parse_region_csv, parse_region_listing, resolve_regions, StaticRegionDirectory,
};
use regional_stack_core::update_token::SystemClock;
use regional_stack_core::{generate_document, GenerationSettings, RegionDirectory, ResolutionError};

/// Region source shared by `generate` and `regions`.
#[derive(Args, Debug, Clone, Default)]
pub struct RegionSource {
    /// Explicit comma separated region list; skips the AWS CLI query
    #[arg(long, env = "REGIONS")]
    pub regions: Option<String>,
    /// Region the AWS CLI query is sent to
    #[arg(long)]
    pub query_region: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub source: RegionSource,
    /// Comma separated regions the handler provisions; others get placeholders
    #[arg(long, env = "ENABLED_REGIONS")]
    pub enabled_regions: Option<String>,
    /// Default value for the source bucket parameter
    #[arg(long, env = "SOURCE_BUCKET")]
    pub source_bucket: Option<String>,
    /// Key of the regional template inside the source bucket
    #[arg(long, default_value = DEFAULT_TEMPLATE_KEY)]
    pub template_key: String,
    /// Key of the packaged handler inside the source bucket
    #[arg(long, default_value = DEFAULT_CODE_KEY)]
    pub code_key: String,
    #[arg(long, default_value = DEFAULT_RUNTIME)]
    pub runtime: String,
    /// Handler timeout in seconds
    #[arg(long, default_value_t = DEFAULT_HANDLER_TIMEOUT_SECS)]
    pub handler_timeout: u32,
    /// Region used in each child's bucket name
    #[arg(value_enum, long, default_value_t = Scope::Deployment)]
    pub naming_scope: Scope,
    /// Output file; stdout when omitted
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Scope {
    /// Region the parent stack is deployed in
    Deployment,
    /// Each child's own region
    Target,
}

impl From<Scope> for NamingScope {
    fn from(value: Scope) -> Self {
        match value {
            Scope::Deployment => NamingScope::DeploymentRegion,
            Scope::Target => NamingScope::TargetRegion,
        }
    }
}

/// Lists regions through `aws ec2 describe-regions`.
pub struct AwsCliRegionDirectory {
    query_region: Option<String>,
}

impl RegionDirectory for AwsCliRegionDirectory {
    fn list_regions(&self) -> Result<Vec<String>, ResolutionError> {
        let mut command = Command::new("aws");
        command.args([
            "ec2",
            "describe-regions",
            "--output",
            "json",
            "--query",
            "Regions[].RegionName",
        ]);
        if let Some(region) = &self.query_region {
            command.arg("--region").arg(region);
        }

        let output = command
            .output()
            .map_err(|error| ResolutionError::Unreachable(format!("failed to run aws cli: {error}")))?;
        if !output.status.success() {
            return Err(ResolutionError::Unreachable(format!(
                "aws ec2 describe-regions failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_region_listing(&output.stdout)
    }
}

impl RegionSource {
    pub fn directory(&self) -> Box<dyn RegionDirectory> {
        match &self.regions {
            Some(raw) => Box::new(StaticRegionDirectory::new(
                raw.split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_string),
            )),
            None => Box::new(AwsCliRegionDirectory {
                query_region: self.query_region.clone(),
            }),
        }
    }
}

pub fn settings_from_args(args: &GenerateArgs) -> Result<GenerationSettings, String> {
    let mut fan_out = FanOutConfig {
        template_key: args.template_key.clone(),
        naming_scope: args.naming_scope.into(),
        ..FanOutConfig::default()
    };
    if let Some(raw) = &args.enabled_regions {
        fan_out.enabled_regions =
            parse_region_csv(raw).map_err(|error| format!("invalid enabled regions: {error}"))?;
    }

    Ok(GenerationSettings {
        source_bucket_default: args
            .source_bucket
            .clone()
            .filter(|bucket| !bucket.trim().is_empty()),
        fan_out,
        handler: HandlerSettings {
            code_key: args.code_key.clone(),
            runtime: args.runtime.clone(),
            timeout_secs: args.handler_timeout,
            ..HandlerSettings::default()
        },
        ..GenerationSettings::default()
    })
}

pub fn run_generate(args: &GenerateArgs) -> Result<(), String> {
    let settings = settings_from_args(args)?;
    let directory = args.source.directory();
    let document = generate_document(directory.as_ref(), &settings, &SystemClock)
        .map_err(|error| error.to_string())?;
    let rendered = document
        .to_json_pretty()
        .map_err(|error| format!("failed to render document: {error}"))?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{rendered}\n"))
                .map_err(|error| format!("failed to write '{}': {error}", path.display()))?;
            eprintln!(
                "wrote {} regional stacks to {}",
                document.children().len(),
                path.display()
            );
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

pub fn run_regions(source: &RegionSource) -> Result<(), String> {
    let regions = resolve_regions(source.directory().as_ref()).map_err(|error| error.to_string())?;
    for region in regions {
        println!("{region}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Built by hand so REGIONS, ENABLED_REGIONS and SOURCE_BUCKET in the
    // environment cannot leak in through the clap env fallbacks.
    fn base_args(regions: &str) -> GenerateArgs {
        GenerateArgs {
            source: RegionSource {
                regions: Some(regions.to_string()),
                query_region: None,
            },
            enabled_regions: None,
            source_bucket: None,
            template_key: DEFAULT_TEMPLATE_KEY.to_string(),
            code_key: DEFAULT_CODE_KEY.to_string(),
            runtime: DEFAULT_RUNTIME.to_string(),
            handler_timeout: DEFAULT_HANDLER_TIMEOUT_SECS,
            naming_scope: Scope::Deployment,
            output: None,
        }
    }

    #[test]
    fn defaults_match_core_settings() {
        let args = base_args("us-east-1");
        let settings = settings_from_args(&args).expect("settings should build");

        assert_eq!(settings.fan_out, FanOutConfig::default());
        assert_eq!(settings.handler, HandlerSettings::default());
        assert_eq!(settings.source_bucket_default, None);
    }

    #[test]
    fn overrides_flow_into_settings() {
        let args = GenerateArgs {
            enabled_regions: Some("eu-west-1".to_string()),
            source_bucket: Some("artifacts".to_string()),
            handler_timeout: 600,
            naming_scope: Scope::Target,
            ..base_args("us-east-1,eu-west-1")
        };
        let settings = settings_from_args(&args).expect("settings should build");

        assert_eq!(settings.fan_out.enabled_regions_value(), "eu-west-1");
        assert_eq!(settings.fan_out.naming_scope, NamingScope::TargetRegion);
        assert_eq!(settings.source_bucket_default.as_deref(), Some("artifacts"));
        assert_eq!(settings.handler.timeout_secs, 600);
    }

    #[test]
    fn rejects_malformed_enabled_regions() {
        let args = GenerateArgs {
            enabled_regions: Some("us-east-1,EU WEST".to_string()),
            ..base_args("us-east-1")
        };
        let error = settings_from_args(&args).expect_err("settings should fail");
        assert!(error.contains("invalid enabled regions"));
    }

    #[test]
    fn blank_source_bucket_means_no_default() {
        let args = GenerateArgs {
            source_bucket: Some("  ".to_string()),
            ..base_args("us-east-1")
        };
        let settings = settings_from_args(&args).expect("settings should build");
        assert_eq!(settings.source_bucket_default, None);
    }

    #[test]
    fn explicit_regions_skip_the_cli() {
        let source = RegionSource {
            regions: Some("ap-south-1, ,sa-east-1".to_string()),
            query_region: None,
        };
        let regions = resolve_regions(source.directory().as_ref()).expect("regions should resolve");
        let names: Vec<&str> = regions.iter().map(|region| region.as_str()).collect();
        assert_eq!(names, vec!["ap-south-1", "sa-east-1"]);
    }

    #[test]
    fn generated_document_lists_every_region() {
        let args = base_args("us-east-1,ca-central-1");
        let settings = settings_from_args(&args).expect("settings should build");
        let document = generate_document(
            args.source.directory().as_ref(),
            &settings,
            &regional_stack_core::update_token::FixedClock(42),
        )
        .expect("document should generate");

        assert!(document.child("RegionalBucketuseast1").is_some());
        assert!(document.child("RegionalBucketcacentral1").is_some());
    }
}
