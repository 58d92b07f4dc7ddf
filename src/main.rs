use clap::{CommandFactory, Parser as ClapParser, Subcommand, error::ErrorKind};
use cogc::{
    backend::{lir, pretty_print::pretty_print_function, verify::verify_module},
    diagnostics::Position,
    middle::{
        conversion,
        literal::Literal,
        primitive::PrimitiveType,
        ty::{Declaration, Typename},
        unit::{CompilationUnit, LossyConversion, UnitOptions},
    },
};
use colored::Colorize;

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    command: Command,

    /// Report lossy implicit conversions as errors instead of warnings
    #[arg(long, global = true)]
    deny_lossy: bool,

    /// Log more, repeat for even more
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the exact binary value and type of numeric literals
    Literal { texts: Vec<String> },

    /// Print the implicit conversion distance between two primitive types
    Distance { from: String, to: String },

    /// Emit a conversion between two primitive types and print the LIR
    Cast {
        from: String,
        to: String,

        /// Use an explicit cast, which also allows narrowing
        #[arg(long)]
        explicit: bool,
    },
}

fn parse_primitive(text: &str) -> PrimitiveType {
    match text.parse() {
        Ok(ty) => ty,
        Err(error) => Args::command()
            .error(ErrorKind::InvalidValue, format!("Invalid type '{text}': {error}"))
            .exit(),
    }
}

fn print_literals(texts: &[String]) {
    if texts.is_empty() {
        Args::command()
            .error(ErrorKind::MissingRequiredArgument, "Missing literals!")
            .exit();
    }

    for text in texts {
        match Literal::parse(text) {
            Ok(Literal::Boolean(value)) => println!("{text}: {value} ({})", PrimitiveType::BOOLEAN),
            Ok(Literal::Numeric(numeric)) => {
                let inexact = if numeric.inexact { " inexact".yellow().to_string() } else { String::new() };

                println!(
                    "{text}: {} * 2^{} ({}){inexact}",
                    numeric.mantissa,
                    numeric.exponent,
                    numeric.ty()
                );
            }
            Err(error) => eprintln!("{}: {text}: {error}", "error".red()),
        }
    }
}

fn print_distance(from: &str, to: &str) {
    let (from, to) = (parse_primitive(from), parse_primitive(to));

    match conversion::primitive_distance(from, to) {
        Some(bits) => println!("{from} -> {to}: {bits}"),
        None => println!("{from} -> {to}: {}", "not implicitly convertible".red()),
    }
}

/// Compiles `fn cast(value: from) -> to { return value }` and prints it
fn print_cast(from: &str, to: &str, explicit: bool, lossy_conversion: LossyConversion) -> bool {
    let (from, to) = (parse_primitive(from), parse_primitive(to));
    let position = Position::new(1, 1);

    let mut unit = CompilationUnit::with_options(
        lir::Module::new(),
        UnitOptions {
            lossy_conversion,
            ..UnitOptions::default()
        },
    );

    let function = unit.declare_function(
        "cast",
        vec![Declaration::new(from.into(), "value")],
        to.into(),
        Typename::VOID,
        position,
    );

    let Some(function) = function else {
        unit.diagnostics().report("<cast>");
        return false;
    };

    unit.begin_function(function, position);

    let value = unit.identifier("value", position);
    let value = if explicit {
        unit.cast_to(value, to.into(), position)
    } else {
        value
    };

    unit.return_value(value, position);
    unit.end_function(position);

    let (module, diagnostics) = unit.finish();
    diagnostics.report("<cast>");

    if let Err(errors) = verify_module(&module) {
        for error in errors {
            eprintln!("{}: {error}", "error".red());
        }
        return false;
    }

    if let Some(function) = module.function_named("cast") {
        print!("{}", pretty_print_function(&module, function.id));
    }

    !diagnostics.has_errors()
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let lossy_conversion = if args.deny_lossy {
        LossyConversion::Deny
    } else {
        LossyConversion::Warn
    };

    let succeeded = match &args.command {
        Command::Literal { texts } => {
            print_literals(texts);
            true
        }
        Command::Distance { from, to } => {
            print_distance(from, to);
            true
        }
        Command::Cast { from, to, explicit } => print_cast(from, to, *explicit, lossy_conversion),
    };

    if !succeeded {
        std::process::exit(1);
    }
}
