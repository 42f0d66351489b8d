//! # Description Pool
//!
//! All loaded descriptions of one device family, shared by every context
//! that handles devices of that family.
//!
//! Lookups never modify a published description. When a device reports a
//! channel count the base description has not been resolved for, a clone is
//! resolved and appended under the write lock, so readers iterating the pool
//! only ever see complete descriptions.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::description::{DeviceDescription, DeviceFamily, DeviceType, LogicalDeviceType};
use crate::error::{Result, SchemaError};
use crate::loader;
use crate::packet::WirePacket;

/// Loaded descriptions of one device family
#[derive(Debug)]
pub struct DescriptionPool {
    family: DeviceFamily,
    entries: RwLock<Vec<Arc<DeviceDescription>>>,
}

impl DescriptionPool {
    pub fn new(family: DeviceFamily) -> Self {
        Self { family, entries: RwLock::new(Vec::new()) }
    }

    /// Load every `*.xml` file of a directory
    ///
    /// Files that fail to load are logged and skipped. Schema diagnostics of
    /// the files that do load are logged with the file name.
    ///
    /// # Arguments
    ///
    /// * `family` - Device family of all files in the directory
    /// * `dir` - Directory to scan, not recursive
    ///
    /// # Returns
    ///
    /// * `Result<DescriptionPool>` - Pool with at least one description
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The directory cannot be read
    /// - No file in it could be loaded
    pub fn load_dir<P: AsRef<Path>>(family: DeviceFamily, dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("xml"))
            })
            .collect();
        files.sort();

        let pool = Self::new(family);
        for path in files {
            debug!("Loading device description {}", path.display());
            match loader::load_file(&path, family) {
                Ok(outcome) => {
                    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                    pool.insert(outcome.log(&name));
                }
                Err(e) => error!("Could not load {}: {}", path.display(), e),
            }
        }

        if pool.is_empty() {
            return Err(SchemaError::NoDescriptions { path: dir.to_path_buf() });
        }
        info!("Loaded {} {} device descriptions from {}", pool.len(), family, dir.display());
        Ok(pool)
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Publish a description
    pub fn insert(&self, desc: DeviceDescription) -> Arc<DeviceDescription> {
        let desc = Arc::new(desc);
        self.entries.write().push(Arc::clone(&desc));
        desc
    }

    /// Current entries, including resolved clones
    pub fn snapshot(&self) -> Vec<Arc<DeviceDescription>> {
        self.entries.read().clone()
    }

    /// Find the description for a numeric type code
    ///
    /// # Arguments
    ///
    /// * `ty` - Family and type code reported by the device
    /// * `firmware` - Firmware version reported by the device
    /// * `packet` - Pairing packet carrying the channel count, if any
    ///
    /// # Returns
    ///
    /// * `Option<Arc<DeviceDescription>>` - The matching description, resolved
    ///   for the packet's channel count
    pub fn find<P: WirePacket + ?Sized>(
        &self,
        ty: &LogicalDeviceType,
        firmware: i32,
        packet: Option<&P>,
    ) -> Option<Arc<DeviceDescription>> {
        if ty.family != self.family {
            return None;
        }
        self.resolve_ranked(|t| t.matches_type(ty.type_code, firmware), |desc| desc.count_from_packet(packet))
    }

    /// Find the description for a numeric type code and a known channel count
    ///
    /// A negative `count` means the count is not known yet; like a lookup
    /// without a packet it returns unresolved descriptions as they are.
    pub fn find_with_count(
        &self,
        ty: &LogicalDeviceType,
        firmware: i32,
        count: i32,
    ) -> Option<Arc<DeviceDescription>> {
        if ty.family != self.family {
            return None;
        }
        let count = count.max(-1);
        self.resolve_ranked(
            |t| t.matches_type(ty.type_code, firmware),
            |desc| {
                if desc.count_from_sysinfo_index < 0 {
                    desc.count_from_sysinfo
                } else {
                    count
                }
            },
        )
    }

    /// Find the description for a string type id such as `HM-LC-Sw1-Pl`
    pub fn find_by_type_id<P: WirePacket + ?Sized>(
        &self,
        family: DeviceFamily,
        id: &str,
        packet: Option<&P>,
    ) -> Option<Arc<DeviceDescription>> {
        if family != self.family {
            return None;
        }
        self.resolve_ranked(|t| t.matches_id(id), |desc| desc.count_from_packet(packet))
    }

    /// Find the description whose type constants match a raw packet
    pub fn find_by_packet<P: WirePacket + ?Sized>(
        &self,
        family: DeviceFamily,
        packet: &P,
    ) -> Option<Arc<DeviceDescription>> {
        if family != self.family {
            return None;
        }
        self.resolve(|t| t.matches_packet(packet), |desc| desc.count_from_packet(Some(packet)))
    }

    /// Try rules with an explicit type code before constant patterns
    fn resolve_ranked<M, C>(&self, matches: M, count_for: C) -> Option<Arc<DeviceDescription>>
    where
        M: Fn(&DeviceType) -> bool,
        C: Fn(&DeviceDescription) -> i32,
    {
        self.resolve(|t| t.type_id.is_some() && matches(t), &count_for)
            .or_else(|| self.resolve(|t| t.type_id.is_none() && matches(t), &count_for))
    }

    /// Shared matching walk of all lookups
    ///
    /// A description whose resolved count equals the requested one is an
    /// exact match and returned at once. An unresolved description (count
    /// -1) is remembered as a partial match and only used when no exact match
    /// exists; it is then resolved into a new pool entry.
    fn resolve<M, C>(&self, matches: M, count_for: C) -> Option<Arc<DeviceDescription>>
    where
        M: Fn(&DeviceType) -> bool,
        C: Fn(&DeviceDescription) -> i32,
    {
        let (base, count) = {
            let entries = self.entries.read();
            let mut partial = None;
            for desc in entries.iter() {
                if !desc.supported_types.iter().any(&matches) {
                    continue;
                }
                let count = count_for(desc);
                if desc.count_from_sysinfo == count {
                    return Some(Arc::clone(desc));
                }
                // A resolved description can not be shrunk to fewer channels
                if desc.count_from_sysinfo == -1 {
                    partial = Some((Arc::clone(desc), count));
                }
            }
            partial?
        };

        let mut entries = self.entries.write();
        // Another context may have resolved the same count in the meantime
        if let Some(existing) = entries
            .iter()
            .find(|d| d.count_from_sysinfo == count && d.supported_types.iter().any(&matches))
        {
            return Some(Arc::clone(existing));
        }

        let context = base.supported_types.first().map(|t| t.id.as_str()).unwrap_or("device");
        debug!("Resolving {} for {} channels from sysinfo", context, count);
        let resolved = Arc::new(base.with_sysinfo_count(count).log(context));
        entries.push(Arc::clone(&resolved));
        Some(resolved)
    }
}

/// Load the description directories of all configured families
///
/// Families are loaded in parallel on the blocking thread pool.
///
/// # Errors
///
/// Returns error if any family has no loadable descriptions
pub async fn load_families(config: &Config) -> Result<BTreeMap<DeviceFamily, DescriptionPool>> {
    let tasks: Vec<_> = config
        .families
        .iter()
        .map(|entry| {
            let family = entry.family;
            let directory = entry.directory.clone();
            tokio::task::spawn_blocking(move || DescriptionPool::load_dir(family, directory))
        })
        .collect();

    let mut pools = BTreeMap::new();
    for task in tasks {
        let pool = task.await.map_err(std::io::Error::other)??;
        pools.insert(pool.family(), pool);
    }
    Ok(pools)
}
