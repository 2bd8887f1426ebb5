use std::collections::HashMap;
use std::io::Read as _;
use std::process::ExitCode;

use colored::*;
use diagnostic::DiagnosticEngine;
use evaluator::{
  evaluate_typed_with_config, evaluate_with_config, load_symbol_file, EngineConfig, EvalResult, PcdTracker, PcdType, SymbolTable,
};
use logger::{LogType, Logger};

struct Args {
  expression: Option<String>,
  symbols_path: Option<String>,
  platform_pcds: Vec<String>,
  pcd_type: Option<PcdType>,
  real_value: bool,
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
  let mut args = Args {
    expression: None,
    symbols_path: None,
    platform_pcds: Vec::new(),
    pcd_type: None,
    real_value: false,
  };

  let mut iter = raw.iter();
  while let Some(arg) = iter.next() {
    match arg.as_str() {
      "--symbols" => {
        args.symbols_path = Some(iter.next().ok_or("--symbols requires a path")?.clone());
      },
      "--platform-pcd" => {
        args.platform_pcds.push(iter.next().ok_or("--platform-pcd requires a name")?.clone());
      },
      "--type" => {
        let name = iter.next().ok_or("--type requires a value")?;
        args.pcd_type = Some(parse_pcd_type(name)?);
      },
      "--real-value" => args.real_value = true,
      other if args.expression.is_none() => args.expression = Some(other.to_string()),
      other => return Err(format!("unexpected argument `{}`", other)),
    }
  }

  Ok(args)
}

fn parse_pcd_type(name: &str) -> Result<PcdType, String> {
  match name.to_ascii_uppercase().as_str() {
    "UINT8" => Ok(PcdType::UInt8),
    "UINT16" => Ok(PcdType::UInt16),
    "UINT32" => Ok(PcdType::UInt32),
    "UINT64" => Ok(PcdType::UInt64),
    "BOOLEAN" => Ok(PcdType::Boolean),
    "VOID*" | "VOIDSTAR" => Ok(PcdType::VoidStar),
    other => Err(format!("unknown PCD type `{}`", other)),
  }
}

fn read_expression(args: &Args) -> Result<String, String> {
  if let Some(expr) = &args.expression {
    return Ok(expr.clone());
  }
  let mut buf = String::new();
  std::io::stdin()
    .read_to_string(&mut buf)
    .map_err(|e| format!("failed to read expression from stdin: {}", e))?;
  Ok(buf)
}

fn load_symbols(args: &Args) -> Result<SymbolTable, String> {
  match &args.symbols_path {
    Some(path) => load_symbol_file(path).map_err(|e| e.to_string()),
    None => Ok(HashMap::new()),
  }
}

fn main() -> ExitCode {
  let raw: Vec<String> = std::env::args().skip(1).collect();

  let args = match parse_args(&raw) {
    Ok(args) => args,
    Err(message) => {
      eprintln!("{} {}", "error:".red().bold(), message);
      return ExitCode::FAILURE;
    },
  };

  let expression = match read_expression(&args) {
    Ok(expr) => expr,
    Err(message) => {
      eprintln!("{} {}", "error:".red().bold(), message);
      return ExitCode::FAILURE;
    },
  };

  let symbols = match load_symbols(&args) {
    Ok(symbols) => symbols,
    Err(message) => {
      eprintln!("{} {}", "error:".red().bold(), message);
      return ExitCode::FAILURE;
    },
  };

  let tracker = PcdTracker::new(args.platform_pcds.iter().cloned());
  let config = EngineConfig::default();

  Logger::log(LogType::Info(&format!("evaluating expression from {}", source_label(&args))), 0);

  let mut engine = DiagnosticEngine::new();

  let run_result = match &args.pcd_type {
    Some(pcd_type) => evaluate_typed_with_config(&expression, *pcd_type, &symbols, &tracker, &config)
      .map(|text| println!("{}", text.green())),
    None => evaluate_with_config(&expression, &symbols, &tracker, args.real_value, &config).map(|outcome| {
      match outcome.result() {
        EvalResult::Text(text) => println!("{}", text.green()),
        EvalResult::Bool(value) => println!("{}", value.to_string().green()),
      }
    }),
  };

  if let Err(err) = run_result {
    engine.emit(err.into());
    engine.print_all(&expression);
    return ExitCode::FAILURE;
  }

  let conditional = tracker.conditional_pcds();
  if !conditional.is_empty() {
    let mut names: Vec<&String> = conditional.iter().collect();
    names.sort();
    let list = names.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
    Logger::log(LogType::Debug(&format!("conditional PCDs referenced: {}", list)), 0);
  }

  ExitCode::SUCCESS
}

fn source_label(args: &Args) -> &'static str {
  if args.expression.is_some() {
    "command line"
  } else {
    "stdin"
  }
}
