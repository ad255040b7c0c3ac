//! Fallback store: the embedded sample dataset plus a best-effort local
//! case cache.
//!
//! The sample dataset is static, versioned data. It is used for
//! demonstrations and whenever the upstream is unreachable and no cache is
//! available. Every case it yields is tagged `Origin::Fallback`, and cases
//! recovered from the cache are tagged `Origin::Cached`; neither can be
//! written back.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use caseflow_contracts::{
    case::{Case, Origin},
    error::{CaseflowError, CaseflowResult},
    patient::{Gender, LabClass, LabResult, PatientId, PatientIdentity, VitalsRecord},
};

/// Version tag of the embedded sample dataset.
pub const SAMPLE_DATASET_VERSION: &str = "sample-cases-v1";

/// Version tag written into cache files. Files with another tag are ignored.
pub const CACHE_FORMAT_VERSION: u32 = 1;

// ── Sample dataset ────────────────────────────────────────────────────────────

struct SamplePatient {
    id: &'static str,
    name: &'static str,
    age: u32,
    gender: Gender,
    chief_complaint: &'static str,
    medical_history: &'static str,
    blood_pressure: (u32, u32),
    heart_rate: u32,
    respiratory_rate: u32,
    oxygen_saturation: f64,
    platelet_count: u32,
    cbc: LabClass,
    glucose: f64,
    creatinine: f64,
    coagulation: LabClass,
}

fn sample_patients() -> [SamplePatient; 3] {
    [
        SamplePatient {
            id: "p1",
            name: "John Doe",
            age: 45,
            gender: Gender::Male,
            chief_complaint: "Sudden onset of right-sided weakness and difficulty speaking",
            medical_history: "Hypertension, Smoking",
            blood_pressure: (140, 90),
            heart_rate: 80,
            respiratory_rate: 18,
            oxygen_saturation: 98.0,
            platelet_count: 250_000,
            cbc: LabClass::Normal,
            glucose: 112.0,
            creatinine: 0.8,
            coagulation: LabClass::Normal,
        },
        SamplePatient {
            id: "p2",
            name: "Maria Rodriguez",
            age: 68,
            gender: Gender::Female,
            chief_complaint: "Sudden severe headache, nausea, and confusion",
            medical_history: "Diabetes, Hypertension",
            blood_pressure: (160, 95),
            heart_rate: 88,
            respiratory_rate: 20,
            oxygen_saturation: 96.0,
            platelet_count: 190_000,
            cbc: LabClass::Abnormal,
            glucose: 205.0,
            creatinine: 1.2,
            coagulation: LabClass::Abnormal,
        },
        SamplePatient {
            id: "p3",
            name: "Ahmed Khan",
            age: 52,
            gender: Gender::Male,
            chief_complaint: "Progressive weakness on left side, slurred speech",
            medical_history: "Prior TIA, Hyperlipidemia",
            blood_pressure: (150, 85),
            heart_rate: 76,
            respiratory_rate: 16,
            oxygen_saturation: 99.0,
            platelet_count: 230_000,
            cbc: LabClass::Normal,
            glucose: 98.0,
            creatinine: 0.9,
            coagulation: LabClass::Normal,
        },
    ]
}

impl SamplePatient {
    fn into_case(self) -> Case {
        let identity = PatientIdentity {
            id: PatientId::new(self.id),
            name: self.name.to_string(),
            age: self.age,
            gender: self.gender,
        };
        let mut case = Case::bare(identity, Origin::Fallback);
        case.vitals = Some(VitalsRecord {
            chief_complaint: self.chief_complaint.to_string(),
            medical_history: self.medical_history.to_string(),
            blood_pressure_systolic: self.blood_pressure.0,
            blood_pressure_diastolic: self.blood_pressure.1,
            heart_rate: self.heart_rate,
            respiratory_rate: self.respiratory_rate,
            oxygen_saturation: self.oxygen_saturation,
            significant_head_trauma: false,
            recent_surgery: false,
            recent_myocardial_infarction: false,
            recent_hemorrhage: false,
            platelet_count: self.platelet_count,
            severity_score: None,
            coagulation_index: None,
        });
        case.labs = Some(LabResult {
            cbc: self.cbc,
            glucose: self.glucose,
            creatinine: self.creatinine,
            coagulation: self.coagulation,
        });
        case
    }
}

// ── Local cache ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    saved_at: DateTime<Utc>,
    cases: Vec<Case>,
}

/// A JSON file holding the last successfully assembled live batch.
#[derive(Debug, Clone)]
pub struct CaseCache {
    path: PathBuf,
}

impl CaseCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load cached cases, tagged `Origin::Cached`.
    ///
    /// A missing file is an empty cache, not an error. A file written with a
    /// different format version is ignored.
    pub fn load(&self) -> CaseflowResult<Vec<Case>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CaseflowError::CacheError {
                    reason: format!("failed to read '{}': {}", self.path.display(), e),
                })
            }
        };

        let file: CacheFile = serde_json::from_str(&contents).map_err(|e| CaseflowError::CacheError {
            reason: format!("failed to parse '{}': {}", self.path.display(), e),
        })?;

        if file.version != CACHE_FORMAT_VERSION {
            warn!(
                path = %self.path.display(),
                version = file.version,
                "ignoring case cache with unsupported format version"
            );
            return Ok(Vec::new());
        }

        Ok(file
            .cases
            .into_iter()
            .map(|mut case| {
                case.origin = Origin::Cached;
                case
            })
            .collect())
    }

    /// Replace the cache contents with `cases`.
    pub fn save(&self, cases: &[Case]) -> CaseflowResult<()> {
        let file = CacheFile {
            version: CACHE_FORMAT_VERSION,
            saved_at: Utc::now(),
            cases: cases.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| CaseflowError::CacheError {
            reason: format!("failed to serialize cases: {}", e),
        })?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CaseflowError::CacheError {
                    reason: format!("failed to create '{}': {}", parent.display(), e),
                })?;
            }
        }
        std::fs::write(&self.path, json).map_err(|e| CaseflowError::CacheError {
            reason: format!("failed to write '{}': {}", self.path.display(), e),
        })
    }

    /// Remove the cache file. Removing a missing file succeeds.
    pub fn clear(&self) -> CaseflowResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CaseflowError::CacheError {
                reason: format!("failed to remove '{}': {}", self.path.display(), e),
            }),
        }
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Owner of the sample dataset and the optional local cache.
#[derive(Debug, Clone, Default)]
pub struct FallbackStore {
    cache: Option<CaseCache>,
}

impl FallbackStore {
    /// A store backed by the sample dataset only.
    pub fn new() -> Self {
        Self { cache: None }
    }

    pub fn with_cache(cache: CaseCache) -> Self {
        Self { cache: Some(cache) }
    }

    pub fn cache(&self) -> Option<&CaseCache> {
        self.cache.as_ref()
    }

    /// The fixed, non-empty sample dataset, in listing order.
    pub fn sample(&self) -> Vec<Case> {
        sample_patients().into_iter().map(SamplePatient::into_case).collect()
    }

    /// Cases to show when the upstream yields nothing usable.
    ///
    /// Prefers a non-empty local cache; otherwise the sample dataset. Cache
    /// read failures are logged and fall through to the sample.
    pub fn recover(&self) -> (Vec<Case>, Origin) {
        if let Some(cache) = &self.cache {
            match cache.load() {
                Ok(cases) if !cases.is_empty() => {
                    debug!(path = %cache.path().display(), case_count = cases.len(), "recovered cases from local cache");
                    return (cases, Origin::Cached);
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "local case cache unreadable, using sample dataset"),
            }
        }
        debug!(version = SAMPLE_DATASET_VERSION, "using embedded sample dataset");
        (self.sample(), Origin::Fallback)
    }

    /// Best-effort: remember a live batch in the local cache, if configured.
    pub fn remember(&self, cases: &[Case]) {
        let Some(cache) = &self.cache else {
            return;
        };
        let live: Vec<Case> = cases.iter().filter(|c| c.origin == Origin::Live).cloned().collect();
        if live.is_empty() {
            return;
        }
        if let Err(e) = cache.save(&live) {
            warn!(error = %e, "failed to update local case cache");
        }
    }
}
