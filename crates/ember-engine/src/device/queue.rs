use std::sync::Arc;

use ash::vk;

use super::keys;
use super::physical::PhysicalDeviceInfo;
use super::surface::Surface;
use crate::pipeline::{ArtifactStore, BuildError, BuildStep};

/// Priority given to every requested queue.
pub const DEFAULT_QUEUE_PRIORITY: f32 = 0.1;

/// One hardware queue family as reported by the physical device.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct QueueFamily {
    /// Position in the device's enumerated family list.
    pub index: u32,
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
}

impl QueueFamily {
    pub fn new(index: u32, flags: vk::QueueFlags, queue_count: u32) -> Self {
        Self {
            index,
            flags,
            queue_count,
        }
    }

    /// Builds descriptors from a raw family list, indexed by position.
    pub fn enumerate(properties: &[vk::QueueFamilyProperties]) -> Vec<Self> {
        properties
            .iter()
            .zip(0u32..)
            .map(|(p, index)| Self::new(index, p.queue_flags, p.queue_count))
            .collect()
    }

    pub fn supports(&self, flags: vk::QueueFlags) -> bool {
        self.flags.contains(flags)
    }
}

/// Queue families chosen for rendering and presentation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    pub fn shared(index: u32) -> Self {
        Self {
            graphics: index,
            present: index,
        }
    }

    pub fn split(graphics: u32, present: u32) -> Self {
        Self { graphics, present }
    }

    /// `true` when one family serves both purposes.
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn distinct(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// First family (in enumeration order) that supports all of `flags`.
pub fn first_family_with(families: &[QueueFamily], flags: vk::QueueFlags) -> Option<&QueueFamily> {
    families.iter().find(|f| f.supports(flags))
}

pub fn first_compute_family(families: &[QueueFamily]) -> Option<&QueueFamily> {
    first_family_with(families, vk::QueueFlags::COMPUTE)
}

/// Picks the graphics and present queue families.
///
/// Resolution is first-match in enumeration order, and a single family that
/// does both is always preferred over a split:
///
/// 1. the first graphics family, if it can present;
/// 2. otherwise the first family that does graphics *and* presents;
/// 3. otherwise the first graphics family plus the first presenting family.
///
/// `supports_present` is evaluated lazily per family and may be called more
/// than once for the same family. Its errors abort the resolution.
pub fn resolve_graphics_present<F>(
    families: &[QueueFamily],
    mut supports_present: F,
) -> Result<QueueFamilyIndices, BuildError>
where
    F: FnMut(&QueueFamily) -> Result<bool, BuildError>,
{
    let graphics = first_family_with(families, vk::QueueFlags::GRAPHICS)
        .ok_or_else(|| BuildError::unsupported("no queue family supports graphics"))?;

    if supports_present(graphics)? {
        return Ok(QueueFamilyIndices::shared(graphics.index));
    }

    for family in families {
        if family.supports(vk::QueueFlags::GRAPHICS) && supports_present(family)? {
            return Ok(QueueFamilyIndices::shared(family.index));
        }
    }

    for family in families {
        if supports_present(family)? {
            return Ok(QueueFamilyIndices::split(graphics.index, family.index));
        }
    }

    Err(BuildError::unsupported(
        "no queue family can present to the surface",
    ))
}

/// Queue creation request for one family.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRequest {
    pub family_index: u32,
    pub priorities: Vec<f32>,
}

impl QueueRequest {
    /// One queue at [`DEFAULT_QUEUE_PRIORITY`].
    pub fn single(family_index: u32) -> Self {
        Self {
            family_index,
            priorities: vec![DEFAULT_QUEUE_PRIORITY],
        }
    }

    pub fn to_vk(&self) -> vk::DeviceQueueCreateInfo<'_> {
        vk::DeviceQueueCreateInfo::default()
            .queue_family_index(self.family_index)
            .queue_priorities(&self.priorities)
    }
}

/// One request per distinct family in `indices`.
pub fn queue_requests(indices: QueueFamilyIndices) -> Vec<QueueRequest> {
    indices
        .distinct()
        .into_iter()
        .map(QueueRequest::single)
        .collect()
}

/// Resolves queue families for the selected device against the surface.
///
/// Reads: `PHYSICAL_DEVICE`, `SURFACE`.
/// Publishes: `QUEUE_REQUESTS`, `QUEUE_INDICES`.
#[derive(Debug, Default)]
pub struct SelectQueues;

impl BuildStep for SelectQueues {
    fn build(&mut self, store: &mut ArtifactStore) -> Result<(), BuildError> {
        let physical = store.fetch::<PhysicalDeviceInfo>(keys::PHYSICAL_DEVICE)?;
        let surface = store.fetch::<Arc<Surface>>(keys::SURFACE)?;

        let indices = resolve_graphics_present(&physical.queue_families, |family| {
            surface.supports_present(physical.handle, family.index)
        })?;

        if indices.is_shared() {
            log::info!("graphics + present on queue family {}", indices.graphics);
        } else {
            log::info!(
                "graphics on queue family {}, present on queue family {} (split)",
                indices.graphics,
                indices.present
            );
        }

        match first_compute_family(&physical.queue_families) {
            Some(f) => log::debug!("first compute-capable queue family: {}", f.index),
            None => log::debug!("no compute-capable queue family"),
        }

        let requests = queue_requests(indices);

        store.push(keys::QUEUE_REQUESTS, requests);
        store.push(keys::QUEUE_INDICES, indices);
        Ok(())
    }
}
