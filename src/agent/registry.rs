//! Specialist profiles and the read-only specialist registry.
//!
//! A [`SpecialistProfile`] is the configuration of one specialist: its
//! identifier, the description the planner sees, and the retrieval domains
//! it is scoped to. The [`SpecialistRegistry`] maps identifiers to running
//! [`Specialist`] handles and is shared across requests after startup.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::config::DEFAULT_SPECIALIST;
use super::traits::Specialist;
use crate::error::AgentError;

/// Configuration of one specialist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistProfile {
    /// Registry identifier used in plans (e.g. `"ACADEMIC"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What the specialist covers; shown to the planner.
    pub description: String,
    /// Retrieval domain tags. Empty means the whole corpus.
    #[serde(default)]
    pub domains: Vec<String>,
    /// Whether the structured-query tools are offered when available.
    #[serde(default = "default_true")]
    pub structured_query: bool,
    /// Extra instructions appended to the specialist prompt.
    #[serde(default)]
    pub instructions: Option<String>,
}

const fn default_true() -> bool {
    true
}

impl SpecialistProfile {
    /// Creates a profile scoped to its own domain tag.
    #[must_use]
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: normalize_id(id),
            name: name.to_string(),
            description: description.to_string(),
            domains: vec![normalize_id(id)],
            structured_query: true,
            instructions: None,
        }
    }
}

/// Normalizes a specialist identifier for lookup.
#[must_use]
pub fn normalize_id(id: &str) -> String {
    id.trim().to_uppercase().replace(['-', ' '], "_")
}

/// The built-in specialist set.
#[must_use]
pub fn default_profiles() -> Vec<SpecialistProfile> {
    let mut general = SpecialistProfile::new(
        DEFAULT_SPECIALIST,
        "Assistant",
        "Contact details, addresses, general university information, unclear questions.",
    );
    general.domains.clear();

    vec![
        SpecialistProfile::new(
            "ACADEMIC",
            "Undergraduate Office",
            "Student records (GPA, credits, majors, training points), academic regulations, graduation requirements.",
        ),
        SpecialistProfile::new(
            "FINANCIAL",
            "Finance Office",
            "Tuition fees, payment deadlines, scholarships and financial aid, student debts.",
        ),
        SpecialistProfile::new(
            "ADMISSION",
            "Admissions Office",
            "Entrance exams, admission criteria and benchmarks, application procedures.",
        ),
        SpecialistProfile::new(
            "STUDENT_LIFE",
            "Student Affairs Office",
            "Dormitory, insurance, clubs and activities, campus facilities, conduct rules.",
        ),
        general,
    ]
}

/// Loads specialist profiles from a JSON array.
///
/// # Errors
///
/// Returns [`AgentError::Configuration`] if the file cannot be read, is not
/// a JSON array of profiles, is empty, or repeats an identifier.
pub fn load_profiles(path: &Path) -> Result<Vec<SpecialistProfile>, AgentError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AgentError::config(format!("cannot read {}: {e}", path.display())))?;
    let mut profiles: Vec<SpecialistProfile> = serde_json::from_str(&raw)
        .map_err(|e| AgentError::config(format!("invalid specialists file: {e}")))?;

    if profiles.is_empty() {
        return Err(AgentError::config("specialists file defines no specialists"));
    }
    for profile in &mut profiles {
        profile.id = normalize_id(&profile.id);
        for domain in &mut profile.domains {
            *domain = normalize_id(domain);
        }
    }
    for (idx, profile) in profiles.iter().enumerate() {
        if profiles[..idx].iter().any(|p| p.id == profile.id) {
            return Err(AgentError::config(format!(
                "duplicate specialist id: {}",
                profile.id
            )));
        }
    }
    Ok(profiles)
}

/// Read-only mapping from specialist identifier to specialist.
#[derive(Clone)]
pub struct SpecialistRegistry {
    specialists: HashMap<String, Arc<dyn Specialist>>,
    profiles: Vec<SpecialistProfile>,
    default_id: String,
}

impl SpecialistRegistry {
    /// Creates an empty registry with the given fallback specialist.
    #[must_use]
    pub fn new(default_id: &str) -> Self {
        Self {
            specialists: HashMap::new(),
            profiles: Vec::new(),
            default_id: normalize_id(default_id),
        }
    }

    /// Registers a specialist under its profile identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Configuration`] if the identifier is taken.
    pub fn register(
        &mut self,
        profile: SpecialistProfile,
        specialist: Arc<dyn Specialist>,
    ) -> Result<(), AgentError> {
        let id = normalize_id(&profile.id);
        if id.is_empty() {
            return Err(AgentError::config("specialist id must not be blank"));
        }
        if self.specialists.contains_key(&id) {
            return Err(AgentError::config(format!(
                "specialist {id} registered twice"
            )));
        }
        self.specialists.insert(id, specialist);
        self.profiles.push(profile);
        Ok(())
    }

    /// Checks that the fallback specialist is registered.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Configuration`] when it is missing.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.specialists.contains_key(&self.default_id) {
            Ok(())
        } else {
            Err(AgentError::config(format!(
                "default specialist {} is not registered",
                self.default_id
            )))
        }
    }

    /// Resolves an identifier from a plan step.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn Specialist>> {
        self.specialists.get(&normalize_id(id)).cloned()
    }

    /// Returns `true` if `id` resolves.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.specialists.contains_key(&normalize_id(id))
    }

    /// Profiles in registration order.
    #[must_use]
    pub fn profiles(&self) -> &[SpecialistProfile] {
        &self.profiles
    }

    /// The fallback specialist identifier.
    #[must_use]
    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Number of registered specialists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specialists.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specialists.is_empty()
    }
}

impl std::fmt::Debug for SpecialistRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialistRegistry")
            .field(
                "specialists",
                &self.profiles.iter().map(|p| &p.id).collect::<Vec<_>>(),
            )
            .field("default_id", &self.default_id)
            .finish()
    }
}
