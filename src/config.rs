use anyhow::Result;
use std::fmt;
use std::path::PathBuf;

use crate::Cli;

/// Smallest part size B2 accepts for every part but the last one
pub const MIN_PART_SIZE_MIB: usize = 5;

/// Largest part size B2 accepts (5 GiB)
pub const MAX_PART_SIZE_MIB: usize = 5 * 1024;

const MIB: usize = 1024 * 1024;

/// Validated configuration for one upload run
#[derive(Clone)]
pub struct Config {
    pub key_id: String,
    pub app_id: String,
    pub bucket: String,
    pub src: PathBuf,
    pub dst: String,
    /// Raw writer count as given on the command line, clamped by the upload layer
    pub writers: i64,
    pub region: String,
    pub endpoint: String,
    /// Part size in bytes
    pub part_size: usize,
}

impl Config {
    /// Build the run configuration from parsed command-line arguments
    ///
    /// # Errors
    ///
    /// Returns an error naming the first required flag that is missing or empty,
    /// or describing an invalid region, endpoint or part size
    pub fn from_cli(cli: Cli) -> Result<Self> {
        Self::require("keyID", &cli.key_id)?;
        Self::require("appID", &cli.app_id)?;
        Self::require("bucketName", &cli.bucket_name)?;
        Self::require("src", &cli.src)?;
        Self::require("dst", &cli.dst)?;

        Self::validate_region(&cli.region)?;

        let endpoint = match cli.endpoint {
            Some(endpoint) if !endpoint.is_empty() => {
                Self::validate_endpoint(&endpoint)?;
                endpoint
            }
            _ => Self::default_endpoint(&cli.region),
        };

        Self::validate_part_size(cli.part_size_mib)?;

        Ok(Self {
            key_id: cli.key_id,
            app_id: cli.app_id,
            bucket: cli.bucket_name,
            src: PathBuf::from(cli.src),
            dst: cli.dst,
            writers: cli.writers,
            region: cli.region,
            endpoint,
            part_size: cli.part_size_mib * MIB,
        })
    }

    fn require(flag: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            anyhow::bail!("you must provide the {}", flag);
        }
        Ok(())
    }

    /// Validate B2 region format
    fn validate_region(region: &str) -> Result<()> {
        if region.is_empty() {
            anyhow::bail!("region cannot be empty");
        }

        // B2 regions look like us-west-004 or eu-central-003
        if !region.contains('-') {
            anyhow::bail!(
                "region '{}' doesn't look like a valid B2 region (e.g., us-west-004, eu-central-003)",
                region
            );
        }

        Ok(())
    }

    fn validate_endpoint(endpoint: &str) -> Result<()> {
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            anyhow::bail!(
                "endpoint '{}' must start with http:// or https://",
                endpoint
            );
        }
        Ok(())
    }

    fn validate_part_size(mib: usize) -> Result<()> {
        if mib < MIN_PART_SIZE_MIB {
            anyhow::bail!(
                "part size must be at least {} MiB (got {})",
                MIN_PART_SIZE_MIB,
                mib
            );
        }
        if mib > MAX_PART_SIZE_MIB {
            anyhow::bail!(
                "part size must be at most {} MiB (got {})",
                MAX_PART_SIZE_MIB,
                mib
            );
        }
        Ok(())
    }

    /// S3-compatible endpoint for a B2 region
    pub fn default_endpoint(region: &str) -> String {
        format!("https://s3.{}.backblazeb2.com", region)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("key_id", &"<redacted>")
            .field("app_id", &self.app_id)
            .field("bucket", &self.bucket)
            .field("src", &self.src)
            .field("dst", &self.dst)
            .field("writers", &self.writers)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("part_size", &self.part_size)
            .finish()
    }
}
