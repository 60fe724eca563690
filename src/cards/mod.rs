//! Card data model and the canonical in-memory store

pub mod models;
pub mod store;

pub use models::{
    group_or_general, Card, CardDraft, CardPatch, ColorMapping, QuestionType, SubjectColors,
    GENERAL_GROUP,
};
pub use store::{CardStore, CardStoreError};
