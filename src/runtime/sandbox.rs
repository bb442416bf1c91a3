/// Sandboxed Lua expression evaluator for logic nodes
///
/// Each logic node execution gets its own interpreter with only the pure
/// standard libraries loaded and every loader or metatable escape hatch
/// removed. Values cross the boundary as JSON. An instruction hook stops
/// evaluation once the time budget runs out or the run is cancelled.

use crate::runtime::error::NodeError;
use mlua::{HookTriggers, Lua, LuaOptions, LuaSerdeExt, SerializeOptions, StdLib, VmState};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Ceiling on interpreter heap usage
const MEMORY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// Instructions between two budget checks
const HOOK_INTERVAL: u32 = 1_000;

/// Wall-clock budget for all evaluations of one sandbox
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(5);

/// Globals removed even though the libraries above don't need them
const BLOCKED_GLOBALS: &[&str] = &[
    "load",
    "loadfile",
    "dofile",
    "require",
    "collectgarbage",
    "rawset",
    "rawget",
    "rawequal",
    "setmetatable",
    "getmetatable",
    "os",
    "io",
    "debug",
    "package",
];

/// Bounds on the work a sandbox may do
#[derive(Debug, Clone)]
pub struct SandboxLimits {
    /// Budget counted from sandbox creation
    pub time: Duration,
    /// Stops evaluation at the next hook once set
    pub cancel: Arc<AtomicBool>,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            time: DEFAULT_TIME_BUDGET,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SandboxLimits {
    pub fn with_time(mut self, time: Duration) -> Self {
        self.time = time;
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Interrupt {
    Budget,
    Cancelled,
}

pub struct Sandbox {
    lua: Lua,
    time: Duration,
    interrupt: Arc<OnceLock<Interrupt>>,
}

impl Sandbox {
    /// Create an interpreter with default limits
    pub fn new() -> Result<Self, NodeError> {
        Self::with_limits(SandboxLimits::default())
    }

    /// Create an interpreter with table/string/math/utf8 only
    pub fn with_limits(limits: SandboxLimits) -> Result<Self, NodeError> {
        let libs = StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8;
        let lua = Lua::new_with(libs, LuaOptions::default()).map_err(expression_error)?;
        lua.set_memory_limit(MEMORY_LIMIT_BYTES).map_err(expression_error)?;

        let globals = lua.globals();
        for name in BLOCKED_GLOBALS {
            globals.set(*name, mlua::Nil).map_err(expression_error)?;
        }

        let interrupt = Arc::new(OnceLock::new());
        let tripped = Arc::clone(&interrupt);
        let SandboxLimits { time, cancel } = limits;
        let started = Instant::now();
        lua.set_hook(HookTriggers::new().every_nth_instruction(HOOK_INTERVAL), move |_, _| {
            let reason = if cancel.load(Ordering::Relaxed) {
                Interrupt::Cancelled
            } else if started.elapsed() > time {
                Interrupt::Budget
            } else {
                return Ok(VmState::Continue);
            };
            let _ = tripped.set(reason);
            Err(mlua::Error::runtime("evaluation interrupted"))
        })
        .map_err(expression_error)?;

        Ok(Self { lua, time, interrupt })
    }

    /// Expose a JSON value as a Lua global; JSON null becomes nil
    pub fn bind(&self, name: &str, value: &Value) -> Result<(), NodeError> {
        let options = SerializeOptions::new()
            .serialize_none_to_null(false)
            .serialize_unit_to_null(false);
        let lua_value = self.lua.to_value_with(value, options).map_err(expression_error)?;
        self.lua.globals().set(name, lua_value).map_err(expression_error)
    }

    /// Evaluate an expression (or a chunk ending in `return`) into JSON
    pub fn eval(&self, expression: &str) -> Result<Value, NodeError> {
        let result = self
            .lua
            .load(expression)
            .set_name("expression")
            .eval::<mlua::Value>()
            .map_err(|err| self.interrupted().unwrap_or_else(|| expression_error(err)))?;
        lua_to_json(result)
    }

    fn interrupted(&self) -> Option<NodeError> {
        self.interrupt.get().map(|reason| match reason {
            Interrupt::Budget => NodeError::Timeout(format!(
                "expression exceeded its {}ms budget",
                self.time.as_millis()
            )),
            Interrupt::Cancelled => NodeError::Cancelled,
        })
    }

    /// Evaluate an expression that must produce a boolean
    pub fn eval_bool(&self, expression: &str) -> Result<bool, NodeError> {
        match self.eval(expression)? {
            Value::Bool(flag) => Ok(flag),
            other => Err(NodeError::Expression(format!(
                "'{}' must evaluate to a boolean, got {}",
                expression, other
            ))),
        }
    }
}

fn expression_error(err: mlua::Error) -> NodeError {
    NodeError::Expression(err.to_string())
}

/// Convert a Lua value back into JSON
///
/// Tables with keys 1..n become arrays; every other table (including the
/// empty one) becomes an object. Functions and userdata become null.
fn lua_to_json(lua_value: mlua::Value) -> Result<Value, NodeError> {
    match lua_value {
        mlua::Value::Nil => Ok(Value::Null),
        mlua::Value::Boolean(b) => Ok(Value::Bool(b)),
        mlua::Value::Integer(i) => Ok(Value::from(i)),
        mlua::Value::Number(f) => Ok(serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)),
        mlua::Value::String(s) => {
            let text = s.to_str().map_err(expression_error)?;
            Ok(Value::String(text.to_string()))
        }
        mlua::Value::Table(table) => {
            let mut is_array = true;
            let mut max_index = 0;
            let mut count = 0;

            for pair in table.pairs::<mlua::Value, mlua::Value>() {
                let (key, _) = pair.map_err(expression_error)?;
                count += 1;

                match key {
                    mlua::Value::Integer(i) if i > 0 => max_index = max_index.max(i as usize),
                    _ => {
                        is_array = false;
                        break;
                    }
                }
            }

            if is_array && count > 0 && count == max_index {
                let mut items = Vec::with_capacity(max_index);
                for i in 1..=max_index {
                    let item = table.get::<mlua::Value>(i as i64).map_err(expression_error)?;
                    items.push(lua_to_json(item)?);
                }
                Ok(Value::Array(items))
            } else {
                let mut object = serde_json::Map::new();
                for pair in table.pairs::<mlua::Value, mlua::Value>() {
                    let (key, value) = pair.map_err(expression_error)?;
                    let key = match key {
                        mlua::Value::String(s) => s.to_str().map_err(expression_error)?.to_string(),
                        mlua::Value::Integer(i) => i.to_string(),
                        mlua::Value::Number(f) => f.to_string(),
                        _ => continue,
                    };
                    object.insert(key, lua_to_json(value)?);
                }
                Ok(Value::Object(object))
            }
        }
        _ => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expression_with_bindings() {
        let sandbox = Sandbox::new().unwrap();
        sandbox.bind("item", &json!({ "price": 4, "qty": 3 })).unwrap();
        assert_eq!(sandbox.eval("item.price * item.qty").unwrap(), json!(12));
        assert!(sandbox.eval_bool("item.qty > 2").unwrap());
    }

    #[test]
    fn test_tables_convert_to_arrays_and_objects() {
        let sandbox = Sandbox::new().unwrap();
        assert_eq!(sandbox.eval("{1, 2, 3}").unwrap(), json!([1, 2, 3]));
        assert_eq!(sandbox.eval("{ name = 'x' }").unwrap(), json!({ "name": "x" }));
        assert_eq!(sandbox.eval("{}").unwrap(), json!({}));
    }

    #[test]
    fn test_statement_chunks_can_return() {
        let sandbox = Sandbox::new().unwrap();
        sandbox.bind("input", &json!([1, 2, 3])).unwrap();
        let total = sandbox
            .eval("local s = 0\nfor _, v in ipairs(input) do s = s + v end\nreturn s")
            .unwrap();
        assert_eq!(total, json!(6));
    }

    #[test]
    fn test_null_binds_as_nil() {
        let sandbox = Sandbox::new().unwrap();
        sandbox.bind("acc", &Value::Null).unwrap();
        assert!(sandbox.eval_bool("acc == nil").unwrap());
    }

    #[test]
    fn test_escape_hatches_are_removed() {
        let sandbox = Sandbox::new().unwrap();
        for expr in ["os.time()", "io.open('/etc/passwd')", "require('x')", "load('return 1')()", "setmetatable({}, {})"] {
            assert!(
                matches!(sandbox.eval(expr), Err(NodeError::Expression(_))),
                "{} should fail",
                expr
            );
        }
    }

    #[test]
    fn test_non_boolean_condition_is_an_error() {
        let sandbox = Sandbox::new().unwrap();
        let err = sandbox.eval_bool("1 + 1").unwrap_err();
        assert!(err.to_string().contains("must evaluate to a boolean"));
    }

    #[test]
    fn test_endless_loop_exhausts_the_budget() {
        let sandbox = Sandbox::with_limits(SandboxLimits::default().with_time(Duration::from_millis(50))).unwrap();
        let started = Instant::now();
        let err = sandbox.eval("(function() while true do end end)()").unwrap_err();
        assert!(matches!(err, NodeError::Timeout(_)), "{:?}", err);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_cancel_flag_stops_evaluation() {
        let cancel = Arc::new(AtomicBool::new(false));
        let sandbox = Sandbox::with_limits(SandboxLimits::default().with_cancel(Arc::clone(&cancel))).unwrap();
        assert_eq!(sandbox.eval("1 + 1").unwrap(), json!(2));

        cancel.store(true, Ordering::Relaxed);
        let err = sandbox.eval("local n = 0 while true do n = n + 1 end").unwrap_err();
        assert!(matches!(err, NodeError::Cancelled));
    }

    #[test]
    fn test_syntax_error_is_an_expression_error() {
        let sandbox = Sandbox::new().unwrap();
        assert!(matches!(sandbox.eval("item >"), Err(NodeError::Expression(_))));
    }
}
