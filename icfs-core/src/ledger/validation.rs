use icfs_model::{ContentPatch, NewContent, ReviewPatch};

use crate::error::{LedgerError, Result};

pub const NAME_MAX_CHARS: usize = 75;
pub const EXTENSION_MAX_CHARS: usize = 10;
pub const RATING_MIN: f32 = 0.0;
pub const RATING_MAX: f32 = 5.0;

fn bad(message: impl Into<String>) -> LedgerError {
    LedgerError::BadRequest(message.into())
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(bad("name must not be empty"));
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(bad(format!(
            "name must be at most {NAME_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

pub(crate) fn check_new_content(content: &NewContent) -> Result<()> {
    check_name(&content.name)?;
    if content.cid.trim().is_empty() {
        return Err(bad("cid must not be empty"));
    }
    if content.extension.chars().count() > EXTENSION_MAX_CHARS {
        return Err(bad(format!(
            "extension must be at most {EXTENSION_MAX_CHARS} characters"
        )));
    }
    if content.size < 0 {
        return Err(bad("size must not be negative"));
    }
    Ok(())
}

pub(crate) fn check_content_patch(patch: &ContentPatch) -> Result<()> {
    if patch.is_empty() {
        return Err(bad("nothing to update"));
    }
    if let Some(name) = &patch.name {
        check_name(name)?;
    }
    Ok(())
}

pub(crate) fn check_review(review: &ReviewPatch) -> Result<()> {
    if review.is_empty() {
        return Err(bad("a review needs a rating or a comment"));
    }
    if let Some(rating) = review.rating
        && !(RATING_MIN..=RATING_MAX).contains(&rating)
    {
        return Err(bad(format!(
            "rating must be between {RATING_MIN} and {RATING_MAX}"
        )));
    }
    if review.comment.as_deref().is_some_and(|text| text.trim().is_empty()) {
        return Err(bad("comment must not be empty"));
    }
    Ok(())
}
