use gridmill_lang::Program;
use proptest::prelude::*;
use serde_json::json;

proptest! {
    /// Remote parties control the source text; compilation must reject,
    /// never panic.
    #[test]
    fn prop_compile_never_panics(source in "\\PC{0,64}") {
        let _ = Program::compile(&source);
    }

    /// Arithmetic over arbitrary integers wraps instead of overflowing.
    #[test]
    fn prop_eval_never_panics(n in any::<i64>()) {
        let program = Program::compile("int(x) * int(x) + 1").unwrap();
        let _ = program.eval(&json!(n.to_string()));
    }

    /// Integer literals round-trip through parse and eval.
    #[test]
    fn prop_literal_identity(n in 0i64..1_000_000) {
        let program = Program::compile(&n.to_string()).unwrap();
        prop_assert_eq!(program.eval(&json!(null)).unwrap(), json!(n));
    }
}
