use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::models::ConditionEntry;

/// Curated condition table. Iteration order is fixed and is the tie-break order for ranking.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<ConditionEntry>,
}

impl KnowledgeBase {
    pub fn from_entries(entries: Vec<ConditionEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            let name = entry.name.as_str();
            if name.trim().is_empty() {
                anyhow::bail!("knowledge base entry with empty name");
            }
            if name.trim() != name {
                anyhow::bail!("knowledge base entry name has surrounding whitespace: {name:?}");
            }
            // `common_cold` and `common cold` display identically.
            if !seen.insert(entry.display_name().to_lowercase()) {
                anyhow::bail!("duplicate knowledge base entry: {name}");
            }
            if entry.symptoms.is_empty() {
                anyhow::bail!("knowledge base entry {name} has no symptoms");
            }
            if entry.questions.is_empty() {
                anyhow::bail!("knowledge base entry {name} has no follow-up questions");
            }
        }

        Ok(Self { entries })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read knowledge base {}", path.display()))?;
        let entries: Vec<ConditionEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse knowledge base {}", path.display()))?;
        Self::from_entries(entries)
    }

    pub fn load(config: &AppConfig) -> Result<Self> {
        match &config.knowledge_base_path {
            Some(path) => {
                let kb = Self::from_json_file(path)?;
                tracing::info!(
                    "loaded {} conditions from {}",
                    kb.len(),
                    path.display()
                );
                Ok(kb)
            }
            None => Ok(Self::builtin()),
        }
    }

    pub fn builtin() -> Self {
        Self {
            entries: builtin_entries(),
        }
    }

    pub fn entries(&self) -> &[ConditionEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&ConditionEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn condition(
    name: &str,
    description: &str,
    symptoms: &[&str],
    questions: &[&str],
    precautions: &[&str],
) -> ConditionEntry {
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    ConditionEntry {
        name: name.to_string(),
        description: description.to_string(),
        symptoms: owned(symptoms),
        questions: owned(questions),
        precautions: owned(precautions),
    }
}

fn builtin_entries() -> Vec<ConditionEntry> {
    vec![
        condition(
            "common_cold",
            "A mild viral infection of the nose and throat that usually clears within a week.",
            &["runny nose", "sneezing", "sore throat", "mild cough", "nasal congestion", "mild fever"],
            &[
                "How many days have you had these symptoms?",
                "Do you have a fever above 38°C?",
            ],
            &["Rest and drink plenty of fluids", "Use saline nasal spray", "Wash hands often"],
        ),
        condition(
            "influenza",
            "A contagious respiratory illness caused by influenza viruses, often with sudden onset.",
            &["high fever", "body aches", "chills", "fatigue", "dry cough", "headache"],
            &[
                "Did your symptoms start suddenly?",
                "Have you been in contact with anyone who had the flu?",
            ],
            &["Rest at home", "Stay hydrated", "Seek care if breathing becomes difficult"],
        ),
        condition(
            "covid_19",
            "A respiratory infection caused by SARS-CoV-2 with a wide range of severity.",
            &["fever", "dry cough", "loss of taste", "loss of smell", "shortness of breath", "fatigue"],
            &[
                "Have you lost your sense of taste or smell?",
                "Have you taken a COVID-19 test?",
            ],
            &["Isolate from others", "Monitor oxygen levels if possible", "Seek urgent care for breathing difficulty"],
        ),
        condition(
            "migraine",
            "A recurring headache disorder with moderate to severe throbbing pain, often on one side.",
            &["throbbing headache", "nausea", "sensitivity to light", "sensitivity to sound", "visual aura"],
            &[
                "Is the pain on one side of your head?",
                "Do you see flashing lights before the pain starts?",
            ],
            &["Rest in a dark, quiet room", "Keep a trigger diary", "Avoid skipping meals"],
        ),
        condition(
            "tension_headache",
            "The most common type of headache, felt as a band of pressure around the head.",
            &["dull headache", "pressure around forehead", "neck pain", "scalp tenderness"],
            &[
                "Does the pain feel like a tight band around your head?",
                "Have you been under stress recently?",
            ],
            &["Take regular breaks from screens", "Practice relaxation techniques", "Keep good posture"],
        ),
        condition(
            "gastroenteritis",
            "Inflammation of the stomach and intestines, usually from a viral or bacterial infection.",
            &["diarrhoea", "vomiting", "stomach cramps", "nausea", "low grade fever"],
            &[
                "How many times have you had diarrhoea today?",
                "Can you keep fluids down?",
            ],
            &["Drink oral rehydration solution", "Eat bland food", "Wash hands after using the toilet"],
        ),
        condition(
            "food_poisoning",
            "Illness caused by eating contaminated food, typically starting within hours of the meal.",
            &["nausea", "vomiting", "diarrhoea", "abdominal pain", "weakness"],
            &[
                "Did anyone who ate the same food get sick?",
                "When did you last eat outside the home?",
            ],
            &["Sip fluids frequently", "Avoid dairy and fatty food", "Seek care if there is blood in stool"],
        ),
        condition(
            "malaria",
            "A mosquito-borne parasitic infection that causes cycles of fever and chills.",
            &["fever with chills", "sweating", "headache", "muscle pain", "vomiting"],
            &[
                "Have you travelled to a malaria area recently?",
                "Do your fevers come and go in cycles?",
            ],
            &["Get a blood test promptly", "Use mosquito nets", "Complete any prescribed treatment"],
        ),
        condition(
            "dengue",
            "A mosquito-borne viral infection that can cause high fever and severe body pain.",
            &["high fever", "severe headache", "pain behind the eyes", "joint pain", "skin rash"],
            &[
                "Do you have pain behind your eyes?",
                "Have you noticed any bleeding from gums or nose?",
            ],
            &["Rest and drink fluids", "Avoid aspirin and ibuprofen", "Seek care for bleeding or severe abdominal pain"],
        ),
        condition(
            "typhoid",
            "A bacterial infection spread through contaminated food or water with a slowly rising fever.",
            &["prolonged fever", "weakness", "stomach pain", "loss of appetite", "constipation"],
            &[
                "How long has the fever lasted?",
                "Have you recently drunk untreated water?",
            ],
            &["Drink only safe water", "Eat freshly cooked food", "Finish the full course of antibiotics"],
        ),
        condition(
            "allergic_rhinitis",
            "An allergic reaction to airborne particles such as pollen, dust or pet dander.",
            &["sneezing", "itchy eyes", "runny nose", "watery eyes", "nasal congestion"],
            &[
                "Do the symptoms get worse at certain times of year?",
                "Do you have any known allergies?",
            ],
            &["Avoid known triggers", "Keep windows closed on high pollen days", "Wash bedding regularly"],
        ),
        condition(
            "asthma",
            "A long-term condition where the airways narrow and swell, making breathing difficult.",
            &["wheezing", "shortness of breath", "chest tightness", "night cough"],
            &[
                "Does exercise or cold air trigger your breathing problems?",
                "Do you wake up at night coughing?",
            ],
            &["Carry your reliever inhaler", "Avoid smoke and known triggers", "Follow an asthma action plan"],
        ),
        condition(
            "urinary_tract_infection",
            "A bacterial infection of the bladder or urinary tract.",
            &["burning urination", "frequent urination", "cloudy urine", "pelvic pain"],
            &[
                "Do you feel burning when you pass urine?",
                "Do you have a fever or back pain?",
            ],
            &["Drink plenty of water", "Do not delay urination", "See a doctor if symptoms last more than two days"],
        ),
        condition(
            "dehydration",
            "A shortage of body water, often after heat exposure, vomiting or diarrhoea.",
            &["thirst", "dry mouth", "dark urine", "dizziness", "fatigue"],
            &[
                "How much water have you had today?",
                "Have you been vomiting or had diarrhoea?",
            ],
            &["Drink water or oral rehydration solution", "Rest in a cool place", "Seek care for confusion or fainting"],
        ),
    ]
}
