//! `datacode call`: call one native function and print the result

use datacode_vm::{NativeVm, Value};

use super::load_module;

/// Parse a command-line argument into a value.
///
/// `null`, `true` and `false` are keywords; anything that parses as an
/// integer or a float becomes a number; everything else is a string.
pub fn parse_arg(arg: &str) -> Value {
    match arg {
        "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(i) = arg.parse::<i64>() {
                Value::Int(i)
            } else if let Ok(f) = arg.parse::<f64>() {
                Value::Float(f)
            } else {
                Value::Str(arg.to_string())
            }
        }
    }
}

pub fn execute(vm: &mut NativeVm, target: &str, function: &str, args: &[String]) -> anyhow::Result<()> {
    load_module(vm, target)?;
    let args: Vec<Value> = args.iter().map(|a| parse_arg(a)).collect();
    let result = vm.call(function, &args)?;
    println!("{}", result);
    Ok(())
}
