//! Typed placeholder substitution over the card template asset.
//!
//! The template is a plain markup document carrying literal `{{NAME}}`
//! placeholder tokens. Tokens are enum-keyed and validated once at load so a
//! renamed or missing placeholder fails startup instead of silently
//! producing a half-substituted card. Rendering itself is a pure string
//! transform and never fails.
//!
//! The verified-badge region uses comment-delimiter toggling: the
//! `{{#if VERIFIED}}` / `{{/if}}` markers become empty strings when the card
//! is verified and HTML comment delimiters when it is not. This is the one
//! conditional mechanism the renderer supports.

use thiserror::Error;

use crate::domain::card::CardData;
use crate::domain::counters::format_count;

const BADGE_OPEN: &str = "{{#if VERIFIED}}";
const BADGE_CLOSE: &str = "{{/if}}";

/// Placeholder tokens the renderer recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    AvatarUrl,
    DisplayName,
    Handle,
    Text,
    Time,
    Date,
    Comments,
    Retweets,
    Likes,
    Views,
    Shares,
}

impl Token {
    pub const ALL: [Token; 11] = [
        Token::AvatarUrl,
        Token::DisplayName,
        Token::Handle,
        Token::Text,
        Token::Time,
        Token::Date,
        Token::Comments,
        Token::Retweets,
        Token::Likes,
        Token::Views,
        Token::Shares,
    ];

    /// The literal marker as it appears in the template asset.
    pub fn placeholder(self) -> &'static str {
        match self {
            Token::AvatarUrl => "{{AVATAR_URL}}",
            Token::DisplayName => "{{DISPLAY_NAME}}",
            Token::Handle => "{{HANDLE}}",
            Token::Text => "{{TEXT}}",
            Token::Time => "{{TIME}}",
            Token::Date => "{{DATE}}",
            Token::Comments => "{{COMMENTS}}",
            Token::Retweets => "{{RETWEETS}}",
            Token::Likes => "{{LIKES}}",
            Token::Views => "{{VIEWS}}",
            Token::Shares => "{{SHARES}}",
        }
    }
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template is missing required placeholder `{placeholder}`")]
    MissingToken { placeholder: &'static str },
}

/// A validated, immutable card template. Loaded once at process start and
/// shared read-only across concurrent submissions.
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    source: String,
}

impl TemplateDocument {
    /// Validate that every recognized placeholder occurs literally in the
    /// document. The badge conditional markers are optional.
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        for token in Token::ALL {
            if !source.contains(token.placeholder()) {
                return Err(TemplateError::MissingToken {
                    placeholder: token.placeholder(),
                });
            }
        }
        Ok(Self { source })
    }

    /// Substitute every recognized placeholder with the card's field value.
    ///
    /// Counter fields pass through [`format_count`]. Unrecognized `{{...}}`
    /// sequences are left verbatim. Field values are substituted as-is; the
    /// template is a trusted local asset and the original system performed
    /// no escaping either.
    pub fn render(&self, card: &CardData) -> String {
        let mut output = self.source.clone();
        for token in Token::ALL {
            let value = self.value_for(token, card);
            output = output.replace(token.placeholder(), &value);
        }

        let (open, close) = if card.verified {
            ("", "")
        } else {
            ("<!--", "-->")
        };
        output = output.replace(BADGE_OPEN, open);
        output.replace(BADGE_CLOSE, close)
    }

    fn value_for(&self, token: Token, card: &CardData) -> String {
        match token {
            Token::AvatarUrl => card.avatar_url.to_string(),
            Token::DisplayName => card.display_name.clone(),
            Token::Handle => card.handle.clone(),
            Token::Text => card.body.clone(),
            Token::Time => card.time_label.clone(),
            Token::Date => card.date_label.clone(),
            Token::Comments => format_count(card.counters.comments),
            Token::Retweets => format_count(card.counters.reposts),
            Token::Likes => format_count(card.counters.likes),
            Token::Views => format_count(card.counters.views),
            Token::Shares => format_count(card.counters.shares),
        }
    }
}
