use corvid_core::{AppError, AppResult};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

/// Decoded rule action: tag attachment and/or funnel placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionConfig {
    tag_id: Option<Uuid>,
    funnel_placement: Option<FunnelPlacement>,
}

/// Target funnel for objects that are not yet part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunnelPlacement {
    funnel_id: Uuid,
    step_id: Option<Uuid>,
}

impl ActionConfig {
    /// Creates a validated action with at least one mutation.
    pub fn new(tag_id: Option<Uuid>, funnel_placement: Option<FunnelPlacement>) -> AppResult<Self> {
        if tag_id.is_none() && funnel_placement.is_none() {
            return Err(AppError::Config(
                "action_config must set tag_id or funnel_id".to_owned(),
            ));
        }

        Ok(Self {
            tag_id,
            funnel_placement,
        })
    }

    /// Decodes one stored action document.
    ///
    /// The nil UUID is read as an absent value.
    pub fn from_document(document: &Value) -> AppResult<Self> {
        let document: ActionConfigDocument = serde_json::from_value(document.clone())
            .map_err(|error| AppError::Config(format!("invalid action_config: {error}")))?;

        let tag_id = non_nil(document.tag_id);
        let funnel_id = non_nil(document.funnel_id);
        let step_id = non_nil(document.step_id);

        let funnel_placement = match (funnel_id, step_id) {
            (Some(funnel_id), step_id) => Some(FunnelPlacement { funnel_id, step_id }),
            (None, Some(_)) => {
                return Err(AppError::Config(
                    "action_config step_id requires funnel_id".to_owned(),
                ));
            }
            (None, None) => None,
        };

        Self::new(tag_id, funnel_placement)
    }

    /// Returns the tag to attach, if any.
    #[must_use]
    pub fn tag_id(&self) -> Option<Uuid> {
        self.tag_id
    }

    /// Returns the funnel placement, if any.
    #[must_use]
    pub fn funnel_placement(&self) -> Option<&FunnelPlacement> {
        self.funnel_placement.as_ref()
    }
}

impl FunnelPlacement {
    /// Creates a funnel placement. Without a step the funnel's first step is used.
    #[must_use]
    pub fn new(funnel_id: Uuid, step_id: Option<Uuid>) -> Self {
        Self { funnel_id, step_id }
    }

    /// Returns the target funnel.
    #[must_use]
    pub fn funnel_id(&self) -> Uuid {
        self.funnel_id
    }

    /// Returns the explicit target step, if configured.
    #[must_use]
    pub fn step_id(&self) -> Option<Uuid> {
        self.step_id
    }
}

#[derive(Debug, Deserialize)]
struct ActionConfigDocument {
    #[serde(default, alias = "tagId")]
    tag_id: Option<Uuid>,
    #[serde(default, alias = "funnelId")]
    funnel_id: Option<Uuid>,
    #[serde(default, alias = "stepId")]
    step_id: Option<Uuid>,
}

fn non_nil(value: Option<Uuid>) -> Option<Uuid> {
    value.filter(|id| !id.is_nil())
}
