//! Row shapes of the movie catalogue tables.

use super::{Field, FieldType, TableDescriptor};

use FieldType::*;

static FILM_WORK_FIELDS: [Field; 8] = [
    Field::new("id", Identifier),
    Field::new("title", String),
    Field::new("description", Text),
    Field::new("creation_date", Date),
    Field::new("rating", Float),
    Field::new("type", Enum),
    Field::new("created_at", Timestamp),
    Field::new("updated_at", Timestamp),
];

pub static FILM_WORK: TableDescriptor = TableDescriptor::new("film_work", &FILM_WORK_FIELDS);

static GENRE_FIELDS: [Field; 5] = [
    Field::new("id", Identifier),
    Field::new("name", String),
    Field::new("description", Text),
    Field::new("created_at", Timestamp),
    Field::new("updated_at", Timestamp),
];

pub static GENRE: TableDescriptor = TableDescriptor::new("genre", &GENRE_FIELDS);

static PERSON_FIELDS: [Field; 4] = [
    Field::new("id", Identifier),
    Field::new("full_name", String),
    Field::new("created_at", Timestamp),
    Field::new("updated_at", Timestamp),
];

pub static PERSON: TableDescriptor = TableDescriptor::new("person", &PERSON_FIELDS);

static GENRE_FILM_WORK_FIELDS: [Field; 4] = [
    Field::new("id", Identifier),
    Field::new("film_work_id", ForeignKey),
    Field::new("genre_id", ForeignKey),
    Field::new("created_at", Timestamp),
];

pub static GENRE_FILM_WORK: TableDescriptor =
    TableDescriptor::new("genre_film_work", &GENRE_FILM_WORK_FIELDS);

static PERSON_FILM_WORK_FIELDS: [Field; 5] = [
    Field::new("id", Identifier),
    Field::new("film_work_id", ForeignKey),
    Field::new("person_id", ForeignKey),
    Field::new("role", Text),
    Field::new("created_at", Timestamp),
];

pub static PERSON_FILM_WORK: TableDescriptor =
    TableDescriptor::new("person_film_work", &PERSON_FILM_WORK_FIELDS);

/// Referenced tables first, association tables last.
pub static MIGRATION_ORDER: [&TableDescriptor; 5] = [
    &GENRE,
    &PERSON,
    &FILM_WORK,
    &GENRE_FILM_WORK,
    &PERSON_FILM_WORK,
];
