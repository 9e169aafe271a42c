//! different utility modules used throughout the project
/// logger initialisation and saving of result tables into files
pub mod logger;
/// parse task files with structure like " title1 key1: value1, value2 key2: value2 title2 key3:value3, value4"
pub mod task_parser;
mod task_parser_tests;
