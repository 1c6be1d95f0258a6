pub const LABEL_DELIMITER: char = '-';

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LabelError {
    #[error("Label set is empty")]
    Empty,
    #[error("Label {index} ({label:?}) is not of the form <PlantType>-<Condition>")]
    Malformed { index: usize, label: String },
    #[error("Label {0:?} appears more than once")]
    Duplicate(String),
}

/// A class name split at its first delimiter into plant type and condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabel {
    label: String,
    split: usize,
}

impl ClassLabel {
    pub fn parse(label: &str) -> Option<Self> {
        let (plant_type, condition) = label.split_once(LABEL_DELIMITER)?;
        if plant_type.is_empty() || condition.is_empty() {
            return None;
        }
        Some(Self {
            label: label.to_string(),
            split: plant_type.len(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.label
    }

    pub fn plant_type(&self) -> &str {
        &self.label[..self.split]
    }

    pub fn condition(&self) -> &str {
        &self.label[self.split + LABEL_DELIMITER.len_utf8()..]
    }
}

/// Ordered class names; index `i` names output `i` of the model.
#[derive(Debug, Clone)]
pub struct LabelSet {
    labels: Vec<ClassLabel>,
}

impl LabelSet {
    pub fn new<I, S>(labels: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed: Vec<ClassLabel> = Vec::new();
        for (index, label) in labels.into_iter().enumerate() {
            let label = label.as_ref();
            let class = ClassLabel::parse(label).ok_or_else(|| LabelError::Malformed {
                index,
                label: label.to_string(),
            })?;
            if parsed.iter().any(|existing| existing.as_str() == label) {
                return Err(LabelError::Duplicate(label.to_string()));
            }
            parsed.push(class);
        }

        if parsed.is_empty() {
            return Err(LabelError::Empty);
        }
        Ok(Self { labels: parsed })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, index: usize) -> Option<&ClassLabel> {
        self.labels.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassLabel> {
        self.labels.iter()
    }
}
