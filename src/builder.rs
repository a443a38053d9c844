//! Record builder: decoded file -> normalized, transformed record.
//!
//! The builder owns the three per-run choices that shape a record: the
//! measurement reader, the channel policy, and the record layout. It is
//! cheap to clone (everything is behind `Arc`) so the worker can move a copy
//! into a blocking task per file.

use crate::config::TransformConfig;
use crate::data::processor::ChannelPolicy;
use crate::decoder::{DecodedChannel, DecodedFile, MeasurementFileReader};
use crate::error::IngestResult;
use crate::measurement::{
    normalize_group_name, IngestionRecord, MeasurementChannel, MeasurementGroup,
};
use crate::serializer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shape of the emitted record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordLayout {
    /// Every group with every channel.
    #[default]
    Groups,
    /// Only the first channel of the first group.
    FirstChannel,
}

/// Turns raw measurement bytes into a serialized record: decode, transform, assemble.
#[derive(Clone)]
pub struct RecordBuilder {
    reader: Arc<dyn MeasurementFileReader>,
    policy: Arc<ChannelPolicy>,
    layout: RecordLayout,
    placeholders: Arc<[String]>,
}

impl std::fmt::Debug for RecordBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordBuilder")
            .field("reader", &self.reader.name())
            .field("policy", &self.policy.kind())
            .field("layout", &self.layout)
            .finish()
    }
}

impl RecordBuilder {
    /// Builder without untitled-group placeholders.
    pub fn new(
        reader: Arc<dyn MeasurementFileReader>,
        policy: ChannelPolicy,
        layout: RecordLayout,
    ) -> Self {
        Self {
            reader,
            policy: Arc::new(policy),
            layout,
            placeholders: Arc::from(Vec::new()),
        }
    }

    /// Builder configured from the `[transform]` section.
    pub fn from_config(reader: Arc<dyn MeasurementFileReader>, config: &TransformConfig) -> Self {
        let policy = ChannelPolicy::from_kind(config.policy, config.decimals, config.normalization);
        Self::new(reader, policy, config.layout)
            .with_placeholders(config.untitled_placeholders.clone())
    }

    /// Group names the reader uses for untitled groups.
    pub fn with_placeholders(mut self, placeholders: Vec<String>) -> Self {
        self.placeholders = Arc::from(placeholders);
        self
    }

    /// Record shape produced by this builder.
    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Numeric policy applied to every channel.
    pub fn policy(&self) -> &ChannelPolicy {
        &self.policy
    }

    /// Decodes `bytes` and builds the record.
    ///
    /// `Ok(None)` means the file holds nothing to emit: no groups, or, for
    /// the first-channel layout, an empty first group.
    pub fn build(&self, bytes: &[u8]) -> IngestResult<Option<IngestionRecord>> {
        let decoded = self.reader.read(bytes)?;
        self.build_decoded(decoded)
    }

    /// Builds a record from an already decoded file.
    pub fn build_decoded(&self, decoded: DecodedFile) -> IngestResult<Option<IngestionRecord>> {
        if decoded.groups.is_empty() {
            return Ok(None);
        }

        match self.layout {
            RecordLayout::FirstChannel => {
                let first = decoded
                    .groups
                    .into_iter()
                    .next()
                    .and_then(|group| group.channels.into_iter().next());
                match first {
                    Some(channel) => Ok(Some(IngestionRecord::Channel(self.channel(channel)?))),
                    None => Ok(None),
                }
            }
            RecordLayout::Groups => {
                let mut groups = Vec::with_capacity(decoded.groups.len());
                for group in decoded.groups {
                    let channels = group
                        .channels
                        .into_iter()
                        .map(|channel| self.channel(channel))
                        .collect::<IngestResult<Vec<_>>>()?;
                    groups.push(MeasurementGroup {
                        group_name: normalize_group_name(&group.name, &*self.placeholders),
                        channels,
                    });
                }
                Ok(Some(IngestionRecord::Groups(groups)))
            }
        }
    }

    /// Decodes, builds, and renders to JSON text.
    pub fn convert(&self, bytes: &[u8]) -> IngestResult<Option<String>> {
        match self.build(bytes)? {
            Some(record) => Ok(Some(serializer::to_json(&record)?)),
            None => Ok(None),
        }
    }

    fn channel(&self, channel: DecodedChannel) -> IngestResult<MeasurementChannel> {
        let data = self.policy.apply(&channel.name, &channel.samples)?;
        Ok(MeasurementChannel {
            name: channel.name,
            data,
            properties: channel.properties,
        })
    }
}
