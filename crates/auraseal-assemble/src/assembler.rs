//! Concurrent fetch/validate/recover/assemble driver.

use std::collections::BTreeMap;
use std::sync::Arc;

use auraseal_core::manifest::{ComponentRecord, Manifest};
use auraseal_core::part::{Part, PartKind};
use auraseal_core::pipeline::{recover_parts, unpack_component};
use auraseal_core::PackageError;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::AssemblyConfig;
use crate::error::AssemblyError;
use crate::source::{PartSource, SourceError};
use crate::state::{AssemblyStats, PartPhase};

/// Components assembled concurrently by [`Assembler::assemble_all`]; part
/// fetches are additionally bounded by the shared semaphore.
const COMPONENT_FAN_OUT: usize = 4;

/// Drives components from manifest record to verified bytes.
///
/// The manifest is read-only and shared; each call to [`Assembler::assemble`]
/// owns its component's mutable state. Dropping an `assemble` future cancels
/// all of that component's in-flight part fetches and recoveries without
/// affecting siblings.
pub struct Assembler {
    manifest: Arc<Manifest>,
    source: Arc<dyn PartSource>,
    config: AssemblyConfig,
    limiter: Arc<Semaphore>,
    stats: Arc<RwLock<AssemblyStats>>,
}

#[derive(Clone, Copy, Debug)]
enum Want {
    Data(u8),
    Parity(u8),
}

impl Assembler {
    /// Create an assembler over a manifest and a part source.
    #[must_use]
    pub fn new(manifest: Arc<Manifest>, source: Arc<dyn PartSource>, config: AssemblyConfig) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1)));
        Self {
            manifest,
            source,
            config,
            limiter,
            stats: Arc::new(RwLock::new(AssemblyStats::default())),
        }
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> AssemblyStats {
        self.stats.read().clone()
    }

    /// The manifest this assembler serves.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Assemble one component: fetch and validate its parts, recover losses
    /// through parity, decode, and verify against the manifest seal.
    ///
    /// # Errors
    ///
    /// Returns a per-component [`AssemblyError`]; sibling components are
    /// unaffected by this component's failure.
    pub async fn assemble(&self, path: &str) -> Result<Vec<u8>, AssemblyError> {
        let record = self
            .manifest
            .record(path)
            .ok_or_else(|| AssemblyError::UnknownComponent {
                path: path.to_owned(),
            })?;

        let mut phases: BTreeMap<u8, PartPhase> = (0..record.parts)
            .map(|n| (n as u8, PartPhase::Pending))
            .collect();

        // Fetch and validate every data part concurrently.
        let outcomes: Vec<(Want, Option<Part>)> = stream::iter(
            (0..record.parts).map(|n| self.fetch_one(path, record, Want::Data(n as u8))),
        )
        .buffer_unordered(self.config.max_concurrent_fetches)
        .collect()
        .await;

        let mut validated: BTreeMap<u8, Part> = BTreeMap::new();
        let mut missing: Vec<u8> = Vec::new();
        for (want, part) in outcomes {
            let Want::Data(number) = want else { continue };
            if let Some(part) = part {
                set_phase(&mut phases, number, PartPhase::Validated);
                self.stats.write().parts_validated += 1;
                validated.insert(number, part);
            } else {
                set_phase(&mut phases, number, PartPhase::Corrupt);
                self.stats.write().parts_corrupt += 1;
                missing.push(number);
            }
        }
        missing.sort_unstable();

        let mut parity_parts: Vec<Part> = Vec::new();
        if !missing.is_empty() {
            parity_parts = self
                .recover_missing(path, record, &mut phases, &mut validated, &missing)
                .await?;
        }

        let ordered: Vec<Part> = validated.into_values().collect();
        let assembled = match unpack_component(&ordered) {
            Ok(bytes) => bytes,
            Err(PackageError::Codec(err)) => {
                // The stream failed to decode even though every part passed
                // its checksums: corruption the checksums did not catch. Try
                // a leave-one-out repair round against parity.
                warn!(component = path, %err, "decode failed, attempting parity repair");
                self.repair_silent_corruption(path, record, ordered, parity_parts, err)
                    .await?
            }
            Err(source) => {
                return Err(AssemblyError::Unpack {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        if assembled.len() as u64 != record.size {
            return Err(AssemblyError::SizeMismatch {
                path: path.to_owned(),
                got: assembled.len() as u64,
                expected: record.size,
            });
        }
        if !record.seal.verify(&assembled, None) {
            warn!(component = path, "assembled bytes do not match the manifest seal");
            return Err(AssemblyError::IntegrityMismatch {
                path: path.to_owned(),
            });
        }

        self.stats.write().bytes_assembled += assembled.len() as u64;
        info!(
            component = path,
            bytes = assembled.len(),
            "component assembled and verified"
        );
        Ok(assembled)
    }

    /// Assemble every component in the manifest, isolating failures per
    /// component.
    pub async fn assemble_all(&self) -> BTreeMap<String, Result<Vec<u8>, AssemblyError>> {
        let paths: Vec<String> = self
            .manifest
            .components()
            .map(|(path, _)| path.to_owned())
            .collect();

        stream::iter(paths.into_iter().map(|path| async move {
            let result = self.assemble(&path).await;
            (path, result)
        }))
        .buffer_unordered(COMPONENT_FAN_OUT)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect()
    }

    /// Rebuild the missing parts from validated siblings and parity.
    ///
    /// Returns the parity parts that were fetched, for reuse by later repair.
    async fn recover_missing(
        &self,
        path: &str,
        record: &ComponentRecord,
        phases: &mut BTreeMap<u8, PartPhase>,
        validated: &mut BTreeMap<u8, Part>,
        missing: &[u8],
    ) -> Result<Vec<Part>, AssemblyError> {
        for &number in missing {
            set_phase(phases, number, PartPhase::Recovering);
        }

        // Parity geometry travels in every sibling header. With nothing
        // validated, probe the first parity part for it; if that is gone too
        // the component fails closed.
        let parity_count = match validated.values().next() {
            Some(part) => part.parity_count,
            None => {
                let (_, probe) = self.fetch_one(path, record, Want::Parity(0)).await;
                match probe {
                    Some(part) => part.parity_count,
                    None => {
                        for &number in missing {
                            set_phase(phases, number, PartPhase::Unrecoverable);
                        }
                        self.stats.write().parts_unrecoverable += missing.len() as u64;
                        return Err(AssemblyError::InsufficientParts {
                            path: path.to_owned(),
                            missing: missing.len(),
                            tolerable: 0,
                        });
                    }
                }
            }
        };

        let parity_parts = self.fetch_parity_set(path, record, parity_count).await;
        let mut pool: Vec<Part> = validated.values().cloned().collect();
        pool.extend(parity_parts.iter().cloned());

        match recover_parts(&pool, missing, self.config.max_part_size) {
            Ok(rebuilt) => {
                info!(
                    component = path,
                    rebuilt = rebuilt.len(),
                    "missing parts rebuilt from parity"
                );
                for part in rebuilt {
                    set_phase(phases, part.part_number, PartPhase::Recovered);
                    set_phase(phases, part.part_number, PartPhase::Validated);
                    self.stats.write().parts_recovered += 1;
                    validated.insert(part.part_number, part);
                }
                Ok(parity_parts)
            }
            Err(err) => {
                warn!(component = path, %err, "recovery failed");
                for &number in missing {
                    set_phase(phases, number, PartPhase::Unrecoverable);
                }
                self.stats.write().parts_unrecoverable += missing.len() as u64;
                Err(AssemblyError::InsufficientParts {
                    path: path.to_owned(),
                    missing: missing.len(),
                    tolerable: usize::from(parity_count),
                })
            }
        }
    }

    /// Leave-one-out repair for corruption that preserved its own checksums:
    /// rebuild each data part from its siblings and parity; if the rebuilt
    /// payload disagrees with the held one, adopt it and retry the decode.
    async fn repair_silent_corruption(
        &self,
        path: &str,
        record: &ComponentRecord,
        ordered: Vec<Part>,
        mut parity_parts: Vec<Part>,
        err: auraseal_core::CodecError,
    ) -> Result<Vec<u8>, AssemblyError> {
        let parity_count = ordered
            .first()
            .map(|part| part.parity_count)
            .unwrap_or_default();
        if parity_count == 0 {
            return Err(AssemblyError::Unpack {
                path: path.to_owned(),
                source: PackageError::Codec(err),
            });
        }
        if parity_parts.is_empty() {
            parity_parts = self.fetch_parity_set(path, record, parity_count).await;
        }

        for suspect in 0..ordered.len() {
            let number = ordered[suspect].part_number;
            let mut pool: Vec<Part> = ordered
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != suspect)
                .map(|(_, part)| part.clone())
                .collect();
            pool.extend(parity_parts.iter().cloned());

            let Ok(rebuilt) = recover_parts(&pool, &[number], self.config.max_part_size) else {
                continue;
            };
            let Some(candidate) = rebuilt.into_iter().next() else {
                continue;
            };
            if candidate.payload == ordered[suspect].payload {
                continue;
            }

            let mut repaired = ordered.clone();
            repaired[suspect] = candidate;
            if let Ok(bytes) = unpack_component(&repaired) {
                info!(
                    component = path,
                    part = number,
                    "silently corrupt part repaired from parity"
                );
                self.stats.write().parts_recovered += 1;
                return Ok(bytes);
            }
        }

        Err(AssemblyError::Unpack {
            path: path.to_owned(),
            source: PackageError::Codec(err),
        })
    }

    /// Fetch whatever parity parts are still retrievable; parity losses only
    /// shrink the budget, so failures here are not themselves fatal.
    async fn fetch_parity_set(
        &self,
        path: &str,
        record: &ComponentRecord,
        parity_count: u8,
    ) -> Vec<Part> {
        let outcomes: Vec<(Want, Option<Part>)> = stream::iter(
            (0..parity_count).map(|index| self.fetch_one(path, record, Want::Parity(index))),
        )
        .buffer_unordered(self.config.max_concurrent_fetches)
        .collect()
        .await;

        outcomes
            .into_iter()
            .filter_map(|(_, part)| part)
            .collect()
    }

    /// Fetch one part with bounded retries and validate it.
    ///
    /// Timeouts are retried up to `max_retries`; any other failure, and any
    /// validation failure, marks the part lost so the recovery path takes
    /// over.
    async fn fetch_one(
        &self,
        path: &str,
        record: &ComponentRecord,
        want: Want,
    ) -> (Want, Option<Part>) {
        let mut attempt = 0u32;
        loop {
            let Ok(permit) = self.limiter.acquire().await else {
                return (want, None);
            };
            let fetched = tokio::time::timeout(self.config.fetch_timeout, async {
                match want {
                    Want::Data(number) => self.source.fetch_part(path, number).await,
                    Want::Parity(index) => self.source.fetch_parity(path, index).await,
                }
            })
            .await;
            drop(permit);

            match fetched {
                Ok(Ok(bytes)) => {
                    self.stats.write().parts_fetched += 1;
                    return (want, self.validate(path, record, want, &bytes));
                }
                Ok(Err(SourceError::Timeout)) | Err(_) => {
                    if attempt >= self.config.max_retries {
                        warn!(component = path, ?want, attempts = attempt + 1, "fetch timed out");
                        return (want, None);
                    }
                    attempt += 1;
                    self.stats.write().retries += 1;
                }
                Ok(Err(err)) => {
                    warn!(component = path, ?want, %err, "fetch failed");
                    return (want, None);
                }
            }
        }
    }

    /// Structural and health validation of fetched bytes.
    fn validate(
        &self,
        path: &str,
        record: &ComponentRecord,
        want: Want,
        bytes: &[u8],
    ) -> Option<Part> {
        let (part, health) = match Part::from_bytes(bytes) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(component = path, ?want, %err, "part failed structural checks");
                return None;
            }
        };

        let matches_request = match want {
            Want::Data(number) => {
                part.kind == PartKind::Data && part.part_number == number
            }
            Want::Parity(index) => part.kind == (PartKind::Parity { index }),
        };
        if !matches_request
            || part.total_parts != record.parts
            || part.full_size != record.size
        {
            warn!(component = path, ?want, "part header disagrees with manifest record");
            return None;
        }

        let score = health.score();
        if score < self.config.min_coherence {
            warn!(
                component = path,
                ?want,
                score,
                threshold = self.config.min_coherence,
                "part below acceptance threshold"
            );
            return None;
        }

        debug!(component = path, ?want, score, "part validated");
        Some(part)
    }
}

fn set_phase(phases: &mut BTreeMap<u8, PartPhase>, part: u8, next: PartPhase) {
    if let Some(phase) = phases.get_mut(&part) {
        debug_assert!(
            phase.can_transition(next),
            "illegal part transition {phase:?} -> {next:?}"
        );
        *phase = next;
    }
}
