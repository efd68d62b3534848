#[cfg(feature = "serde")]
mod serde_tests {
    use serde_json::json;
    use stencil::{Engine, FunctionRegistry, LexerConfig, RenderConfig, StencilError, Template};

    #[test]
    #[ntest::timeout(100)]
    fn test_template_serialization() {
        let template = Template::new("Hello, {{ name }}!").unwrap();

        let serialized = serde_json::to_string(&template).unwrap();
        assert_eq!(serialized, r#"{"content":"Hello, {{ name }}!","name":null}"#);

        let deserialized: Template = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, template);

        let data = json!({"name": "World"});
        assert_eq!(
            template.render(&data).unwrap(),
            deserialized.render(&data).unwrap()
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_named_template_keeps_name() {
        let mut engine = Engine::new();
        engine.add_template("greeting", "Hi {{ who }}").unwrap();

        let serialized = serde_json::to_string(engine.template("greeting").unwrap()).unwrap();
        let deserialized: Template = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.name(), Some("greeting"));
        assert_eq!(deserialized.render(&json!({"who": "you"})).unwrap(), "Hi you");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_invalid_template_fails_to_deserialize() {
        let result: Result<Template, _> =
            serde_json::from_str(r#"{"content":"{% for x in xs %}"}"#);
        let err = result.unwrap_err().to_string();
        assert!(err.starts_with("Failed to parse template:"), "{err}");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_config_serialization() {
        let config = LexerConfig::default()
            .with_expression("<<", ">>")
            .with_trim_blocks(true);
        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: LexerConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, config);

        // Missing fields fall back to the defaults.
        let partial: LexerConfig = serde_json::from_str(r#"{"lstrip_blocks":true}"#).unwrap();
        assert!(partial.lstrip_blocks);
        assert_eq!(partial.expression_open, "{{");

        let limits: RenderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(limits, RenderConfig::default());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_deserialized_delimiters_are_used() {
        let config: LexerConfig =
            serde_json::from_str(r#"{"expression_open":"<<","expression_close":">>"}"#).unwrap();
        let template =
            Template::parse_with("<< x >> {{ x }}", &config, &FunctionRegistry::new()).unwrap();
        assert_eq!(template.render(&json!({"x": 1})).unwrap(), "1 {{ x }}");

        let mut engine = Engine::with_config(config);
        engine.add_template("custom", "[<< x >>]").unwrap();
        assert_eq!(
            engine.render_named("custom", &json!({"x": 2})).unwrap(),
            "[2]"
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_error_serialization() {
        let err = Template::new("{{ 1 + }}").unwrap_err();
        let serialized = serde_json::to_string(&err).unwrap();
        let deserialized: StencilError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, err);
    }
}
