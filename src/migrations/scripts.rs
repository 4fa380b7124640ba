//! Built-in schema scripts, in application order

use super::MigrationScript;

pub const INITIALIZATION: &str = "2023-09-11 - 01 - Initialization";
pub const FIRST_TABLES: &str = "2023-09-11 - 02 - First tables";
pub const SAMPLE_DATA: &str = "2023-09-12 - 01 - Sample data";

pub fn all() -> Vec<MigrationScript> {
    vec![
        MigrationScript::new(INITIALIZATION, INITIALIZATION_UP, INITIALIZATION_DOWN),
        MigrationScript::new(FIRST_TABLES, FIRST_TABLES_UP, FIRST_TABLES_DOWN),
        MigrationScript::new(SAMPLE_DATA, SAMPLE_DATA_UP, SAMPLE_DATA_DOWN),
    ]
}

const INITIALIZATION_UP: &str = r#"
CREATE TABLE _migrations (
    name TEXT NOT NULL PRIMARY KEY,
    executed_at TEXT NOT NULL
);
"#;

const INITIALIZATION_DOWN: &str = r#"
DROP TABLE _migrations;
"#;

const FIRST_TABLES_UP: &str = r#"
CREATE TABLE user_ (
    id TEXT NOT NULL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE encounter (
    id TEXT NOT NULL PRIMARY KEY,
    advocate_id TEXT NOT NULL REFERENCES user_ (id),
    client_id TEXT NOT NULL REFERENCES user_ (id),
    summary TEXT,
    initiated_by_advocate BOOLEAN NOT NULL DEFAULT FALSE,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE encounter_note (
    id TEXT NOT NULL PRIMARY KEY,
    encounter_id TEXT NOT NULL REFERENCES encounter (id),
    submitted_by_id TEXT REFERENCES user_ (id),
    type INTEGER NOT NULL DEFAULT 1,  -- Direct message
    message TEXT,
    personal BOOLEAN NOT NULL DEFAULT FALSE,
    submitted_at TEXT,
    advocate_read_at TEXT,
    client_read_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE INDEX ix_encounter_advocate ON encounter (advocate_id);
CREATE INDEX ix_encounter_client ON encounter (client_id);
CREATE INDEX ix_encounter_note_encounter ON encounter_note (encounter_id);
"#;

const FIRST_TABLES_DOWN: &str = r#"
DROP TABLE encounter_note;
DROP TABLE encounter;
DROP TABLE user_;
"#;

const SAMPLE_DATA_UP: &str = r#"
----------
INSERT INTO user_ (id, name, created_at, updated_at) VALUES
    ('acf4adb2-1397-47a7-92ae-8336b22556e6', 'Caregiving Cathy', '2023-09-12T01:15:38.000Z', '2023-09-12T01:15:38.000Z'),
    ('a0bc7321-899c-421c-87b6-e0e1a9524076', 'Ailment Amy', '2023-09-12T01:15:38.000Z', '2023-09-12T01:15:38.000Z'),
    ('4b7ca888-6716-457f-bdc2-eb759764c4a9', 'Broken Bill', '2023-09-12T01:15:38.000Z', '2023-09-12T01:15:38.000Z');

----------
INSERT INTO encounter (id, advocate_id, client_id, summary, started_at, created_at, updated_at) VALUES
    ('77624181-1fe3-4fc6-9f37-99a0363cb20a',
     'acf4adb2-1397-47a7-92ae-8336b22556e6', 'a0bc7321-899c-421c-87b6-e0e1a9524076',
     'Initial inquiry',
     '2023-09-12T01:15:38.000Z', '2023-09-12T01:15:38.000Z', '2023-09-12T01:15:38.000Z'),
    ('912b509a-d62e-46b5-960f-6848dc8fb08b',
     'acf4adb2-1397-47a7-92ae-8336b22556e6', '4b7ca888-6716-457f-bdc2-eb759764c4a9',
     'Initial inquiry',
     '2023-09-12T14:15:38.000Z', '2023-09-12T14:15:38.000Z', '2023-09-12T14:15:38.000Z'),
    ('d97b629d-55e8-4534-bfd6-7ae71dec5877',
     'acf4adb2-1397-47a7-92ae-8336b22556e6', '4b7ca888-6716-457f-bdc2-eb759764c4a9',
     'Something happened',
     '2023-09-13T14:15:38.000Z', '2023-09-13T14:15:38.000Z', '2023-09-13T14:15:38.000Z');

----------
INSERT INTO encounter_note (id, encounter_id, submitted_by_id, type, message, personal, submitted_at, created_at, updated_at) VALUES
    ('c3d6a118-4125-4851-ba23-a511e861259c',
     '77624181-1fe3-4fc6-9f37-99a0363cb20a', 'a0bc7321-899c-421c-87b6-e0e1a9524076',
     1,  -- Direct message
     'Hey there. Can you help me?' || char(10) || char(10) || 'I don''t *feel* so good.',
     FALSE,
     '2023-09-12T01:15:38.000Z', '2023-09-12T01:15:38.000Z', '2023-09-12T01:15:38.000Z'),
    ('261a8fea-c8f0-4fbe-8447-f157ac013666',
     '912b509a-d62e-46b5-960f-6848dc8fb08b', '4b7ca888-6716-457f-bdc2-eb759764c4a9',
     1,  -- Direct message
     'It hurts when I hit my head like this.' || char(10) || char(10) || 'Can you help?',
     FALSE,
     '2023-09-12T14:15:38.000Z', '2023-09-12T14:15:38.000Z', '2023-09-12T14:15:38.000Z'),
    ('8e966b88-f2d5-43dc-a770-12cdf719a87b',
     'd97b629d-55e8-4534-bfd6-7ae71dec5877', 'acf4adb2-1397-47a7-92ae-8336b22556e6',
     2,  -- Case note
     'I don''t know what. But something happened.',
     TRUE,
     '2023-09-13T14:15:38.000Z', '2023-09-13T14:15:38.000Z', '2023-09-13T14:15:38.000Z');
"#;

const SAMPLE_DATA_DOWN: &str = r#"
DELETE FROM encounter_note;
DELETE FROM encounter;
DELETE FROM user_;
"#;
