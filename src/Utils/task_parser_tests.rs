//////////////////////////////////////TESTS//////////////////////////////////////
#[cfg(test)]
mod tests {
    use crate::Utils::task_parser::{
        TaskDocument, TaskError, Value, parse_document, parse_key, parse_key_value_pair,
        parse_section, parse_title, parse_value, parse_value_list,
    };
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TASK: &str = "
// solver settings
solver
  method: universal
  line_search: super_search
  tolerance: 1e-12
  max_iterations: 5000
  seed: 42
# the sweep
process
  task: task1
  temperature: 350, 650, 10
  HCl: 10000
  delta: 0.01
";

    #[test]
    fn test_parse_title_and_key() {
        let (remaining, title) = parse_title("solver\n  method: newton").unwrap();
        assert_eq!(title, "solver");
        assert_eq!(remaining, "method: newton");
        let (remaining, key) = parse_key("max_iterations: 100").unwrap();
        assert_eq!(key, "max_iterations");
        assert_eq!(remaining, ": 100");
        assert!(parse_key("1abc: 2").is_err());
    }

    #[test]
    fn test_parse_value_types() {
        assert_eq!(parse_value("350, 650").unwrap(), (", 650", Value::Integer(350)));
        assert_eq!(parse_value("1e-12 next").unwrap(), (" next", Value::Float(1e-12)));
        assert_eq!(parse_value("true;").unwrap(), (";", Value::Boolean(true)));
        assert_eq!(
            parse_value("/tmp/bank.dat").unwrap(),
            ("", Value::String("/tmp/bank.dat".to_string()))
        );
        let (remaining, values) = parse_value_list("350 , 650,10").unwrap();
        assert_eq!(
            values,
            vec![Value::Integer(350), Value::Integer(650), Value::Integer(10)]
        );
        assert_eq!(remaining, "");
    }

    #[test]
    fn test_parse_pairs_and_sections() {
        let (remaining, (key, values)) = parse_key_value_pair("tolerance : 1e-9  seed: 1").unwrap();
        assert_eq!(key, "tolerance");
        assert_eq!(values, vec![Value::Float(1e-9)]);
        assert_eq!(remaining, "seed: 1");

        let (remaining, (title, map)) =
            parse_section("solver method: newton seed: 3 process task: task2").unwrap();
        assert_eq!(title, "solver");
        assert_eq!(map.len(), 2);
        assert_eq!(map["seed"], vec![Value::Integer(3)]);
        assert_eq!(remaining, "process task: task2");

        let (remaining, document) =
            parse_document("solver method: newton process task: task2").unwrap();
        assert_eq!(remaining, "");
        assert_eq!(document.len(), 2);
    }

    #[test]
    fn test_task_document_accessors() {
        let task = TaskDocument::parse(TASK).unwrap();
        assert!(task.has_section("solver"));
        assert!(task.has_section("process"));
        assert_eq!(
            task.get_string("solver", "method").unwrap(),
            Some("universal".to_string())
        );
        assert_eq!(task.get_f64("solver", "tolerance").unwrap(), Some(1e-12));
        assert_eq!(task.get_usize("solver", "max_iterations").unwrap(), Some(5000));
        // integers are numbers
        assert_eq!(task.get_f64("process", "HCl").unwrap(), Some(10000.0));
        assert_eq!(
            task.get_f64_list("process", "temperature").unwrap(),
            Some(vec![350.0, 650.0, 10.0])
        );
        assert_eq!(task.get_f64("solver", "deadline").unwrap(), None);
        assert_eq!(task.get_string("output", "dir").unwrap(), None);
    }

    #[test]
    fn test_task_document_type_errors() {
        let task = TaskDocument::parse(TASK).unwrap();
        assert!(matches!(
            task.get_f64("solver", "method"),
            Err(TaskError::WrongType { .. })
        ));
        assert!(matches!(
            task.get_f64("process", "temperature"),
            Err(TaskError::WrongType { .. })
        ));
        assert!(matches!(
            task.get_usize("solver", "tolerance"),
            Err(TaskError::WrongType { .. })
        ));
        let missing = TaskDocument::require(task.get_f64("solver", "deadline").unwrap(), "solver", "deadline");
        assert_eq!(
            missing,
            Err(TaskError::MissingKey {
                section: "solver".to_string(),
                key: "deadline".to_string()
            })
        );
    }

    #[test]
    fn test_malformed_and_empty_documents() {
        assert!(matches!(
            TaskDocument::parse("solver tolerance: 1 ;"),
            Err(TaskError::Trailing(_))
        ));
        assert!(matches!(
            TaskDocument::parse("solver"),
            Err(TaskError::Syntax(_))
        ));
        let empty = TaskDocument::parse("// nothing here\n\n").unwrap();
        assert!(!empty.has_section("solver"));
    }

    #[test]
    fn test_task_document_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TASK.as_bytes()).unwrap();
        let task = TaskDocument::from_file(file.path()).unwrap();
        assert_eq!(task.get_usize("solver", "seed").unwrap(), Some(42));
        assert_eq!(
            task.get_string("solver", "line_search").unwrap(),
            Some("super_search".to_string())
        );
        assert!(matches!(
            TaskDocument::from_file(std::path::Path::new("/no/such/task.txt")),
            Err(TaskError::Io { .. })
        ));
    }
}
