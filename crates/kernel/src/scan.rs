#![forbid(unsafe_code)]

use crate::banner::{Banner, image_banner, parse_banner};
use crate::error::Error;
use crate::natord::natural_cmp;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, trace, warn};

/// Outcome of comparing the running kernel against the images on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelVerdict {
    UpToDate,
    /// An installed image shares the running release but was built later.
    AbiUpgrade { current: String, expected: String },
    /// An installed image carries a strictly greater release.
    VersionUpgrade { current: String, expected: String },
    Unknown,
}

impl KernelVerdict {
    /// Numeric status for the batch serialisation: 0 unknown, 1 current,
    /// 2 ABI upgrade, 3 version upgrade.
    pub fn status_code(&self) -> u8 {
        match self {
            KernelVerdict::Unknown => 0,
            KernelVerdict::UpToDate => 1,
            KernelVerdict::AbiUpgrade { .. } => 2,
            KernelVerdict::VersionUpgrade { .. } => 3,
        }
    }

    pub fn current(&self) -> Option<&str> {
        match self {
            KernelVerdict::AbiUpgrade { current, .. }
            | KernelVerdict::VersionUpgrade { current, .. } => Some(current),
            _ => None,
        }
    }

    pub fn expected(&self) -> Option<&str> {
        match self {
            KernelVerdict::AbiUpgrade { expected, .. }
            | KernelVerdict::VersionUpgrade { expected, .. } => Some(expected),
            _ => None,
        }
    }
}

/// Scans a boot directory for kernel images and compares them against the
/// running kernel's banner.
#[derive(Debug, Clone)]
pub struct KernelScanner {
    boot_dir: PathBuf,
    version_path: PathBuf,
}

impl KernelScanner {
    pub fn new(boot_dir: impl Into<PathBuf>) -> Self {
        Self {
            boot_dir: boot_dir.into(),
            version_path: PathBuf::from("/proc/version"),
        }
    }

    /// Override where the running-kernel banner is read from.
    pub fn with_version_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.version_path = path.into();
        self
    }

    /// Never fails outward: anything unreadable or unparsable degrades the
    /// verdict to `Unknown` rather than aborting the scan.
    pub fn scan(&self) -> KernelVerdict {
        match self.compare() {
            Ok(verdict) => verdict,
            Err(err) => {
                debug!(%err, "kernel scan degraded to unknown");
                KernelVerdict::Unknown
            }
        }
    }

    fn compare(&self) -> Result<KernelVerdict, Error> {
        let running = self.running_banner()?;
        let images = self.installed_banners()?;
        Ok(self.verdict(&running, &images))
    }

    fn running_banner(&self) -> Result<Banner, Error> {
        let text =
            fs::read_to_string(&self.version_path).map_err(|source| Error::VersionUnreadable {
                path: self.version_path.clone(),
                source,
            })?;
        parse_banner(&text).ok_or_else(|| Error::BannerMissing(self.version_path.clone()))
    }

    fn installed_banners(&self) -> Result<Vec<Banner>, Error> {
        let entries = fs::read_dir(&self.boot_dir).map_err(|source| Error::BootDirUnreadable {
            path: self.boot_dir.clone(),
            source,
        })?;

        let mut images = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(%err, "failed to read boot directory entry");
                    continue;
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !is_kernel_image(name) {
                continue;
            }
            // One unreadable image does not spoil the comparison against
            // the rest.
            let data = match fs::read(entry.path()).map_err(|source| Error::ImageUnreadable {
                path: entry.path(),
                source,
            }) {
                Ok(data) => data,
                Err(err) => {
                    warn!(%err, "skipping kernel image");
                    continue;
                }
            };
            match image_banner(&data) {
                Some(banner) => {
                    trace!(image = name, release = %banner.release, "kernel image banner");
                    images.push(banner);
                }
                None => debug!(image = name, "no version banner found in image"),
            }
        }
        Ok(images)
    }

    fn verdict(&self, running: &Banner, images: &[Banner]) -> KernelVerdict {
        let mut newest: Option<&Banner> = None;
        for image in images {
            if natural_cmp(&image.release, &running.release) == Ordering::Greater
                && newest.is_none_or(|best| {
                    natural_cmp(&image.release, &best.release) == Ordering::Greater
                })
            {
                newest = Some(image);
            }
        }
        if let Some(image) = newest {
            return KernelVerdict::VersionUpgrade {
                current: running.release.clone(),
                expected: image.release.clone(),
            };
        }

        let running_tokens: HashSet<&str> = running.tokens().collect();
        for image in images {
            if image.release == running.release
                && !image.tokens().all(|token| running_tokens.contains(token))
            {
                return KernelVerdict::AbiUpgrade {
                    current: running.release.clone(),
                    expected: image.release.clone(),
                };
            }
        }

        if images.is_empty() {
            KernelVerdict::Unknown
        } else {
            KernelVerdict::UpToDate
        }
    }
}

fn is_kernel_image(name: &str) -> bool {
    name.starts_with("vmlinuz") || name.starts_with("vmlinux") || name.starts_with("kernel-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write_fixture(dir: &std::path::Path, running: &str, images: &[(&str, &str)]) -> KernelScanner {
        let boot = dir.join("boot");
        std::fs::create_dir_all(&boot).unwrap();
        let version = dir.join("version");
        std::fs::write(&version, running).unwrap();
        for (name, banner) in images {
            let mut data = vec![0x7fu8, b'E', b'L', b'F', 0, 0];
            data.extend_from_slice(banner.as_bytes());
            data.push(b'\n');
            std::fs::write(boot.join(name), data).unwrap();
        }
        KernelScanner::new(boot).with_version_path(version)
    }

    #[test]
    fn up_to_date_when_image_matches_running() {
        let dir = tempdir().unwrap();
        let banner = "Linux version 5.10.0-1-amd64 (b@x) #1 SMP Debian 5.10.4-1 (2021-01-04)";
        let scanner = write_fixture(dir.path(), banner, &[("vmlinuz-5.10.0-1-amd64", banner)]);
        assert_eq!(scanner.scan(), KernelVerdict::UpToDate);
    }

    #[test]
    fn version_upgrade_picks_newest_release() {
        let dir = tempdir().unwrap();
        let scanner = write_fixture(
            dir.path(),
            "Linux version 5.10.0-9-amd64 (b@x) #1 SMP (2021-01-01)",
            &[
                ("vmlinuz-5.10.0-9-amd64", "Linux version 5.10.0-9-amd64 (b@x) #1 SMP (2021-01-01)"),
                ("vmlinuz-5.10.0-10-amd64", "Linux version 5.10.0-10-amd64 (b@x) #1 SMP (2021-03-01)"),
                ("vmlinuz-5.9.0-5-amd64", "Linux version 5.9.0-5-amd64 (b@x) #1 SMP (2020-11-01)"),
            ],
        );
        assert_eq!(
            scanner.scan(),
            KernelVerdict::VersionUpgrade {
                current: "5.10.0-9-amd64".into(),
                expected: "5.10.0-10-amd64".into(),
            }
        );
    }

    #[test]
    fn abi_upgrade_on_same_release_with_newer_build() {
        let dir = tempdir().unwrap();
        let scanner = write_fixture(
            dir.path(),
            "Linux version 5.10.0-1-amd64 (builder@x) #1 SMP Debian 5.10.0-1 (2021-01-01)",
            &[(
                "vmlinuz-5.10.0-1-amd64",
                "Linux version 5.10.0-1-amd64 (builder@x) #1 SMP Debian 5.10.0-2 (2021-02-01)",
            )],
        );
        assert_eq!(
            scanner.scan(),
            KernelVerdict::AbiUpgrade {
                current: "5.10.0-1-amd64".into(),
                expected: "5.10.0-1-amd64".into(),
            }
        );
    }

    #[test]
    fn unknown_when_no_image_parses() {
        let dir = tempdir().unwrap();
        let scanner = write_fixture(
            dir.path(),
            "Linux version 5.10.0-1-amd64 (b@x) #1 SMP (2021-01-01)",
            &[],
        );
        assert_eq!(scanner.scan(), KernelVerdict::Unknown);
    }

    #[test]
    fn unknown_when_version_file_is_missing() {
        let dir = tempdir().unwrap();
        let scanner = KernelScanner::new(dir.path().join("boot"))
            .with_version_path(dir.path().join("nope"));
        assert_eq!(scanner.scan(), KernelVerdict::Unknown);
    }

    #[test]
    fn non_kernel_files_are_ignored() {
        let dir = tempdir().unwrap();
        let banner = "Linux version 5.10.0-1-amd64 (b@x) #1 SMP (2021-01-01)";
        let scanner = write_fixture(
            dir.path(),
            banner,
            &[
                ("vmlinuz-5.10.0-1-amd64", banner),
                ("initrd.img-9.9.9", "Linux version 9.9.9-amd64 (b@x) #1 SMP (2030-01-01)"),
            ],
        );
        assert_eq!(scanner.scan(), KernelVerdict::UpToDate);
    }

    #[test]
    fn status_codes_for_batch_output() {
        assert_eq!(KernelVerdict::Unknown.status_code(), 0);
        assert_eq!(KernelVerdict::UpToDate.status_code(), 1);
        assert_eq!(
            KernelVerdict::AbiUpgrade {
                current: "a".into(),
                expected: "a".into()
            }
            .status_code(),
            2
        );
        assert_eq!(
            KernelVerdict::VersionUpgrade {
                current: "a".into(),
                expected: "b".into()
            }
            .status_code(),
            3
        );
    }
}
