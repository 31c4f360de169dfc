#![deny(missing_docs)]
//! The minimal builtin library: `flip`, `normal`, `add`/`mul`/`sub`, `if`,
//! `mem`, and `dirichlet_multinomial`, installed into a fresh trace and
//! bound in a single root environment frame.

mod arithmetic;
mod branch;
mod dirichlet_multinomial;
mod flip;
mod mem;
mod normal;

use venture_core::{extend_environment, root_environment, Environment, Value};
use venture_sp::{SPAux, UnitAux, SP};
use venture_trace::Trace;

/// Installs every builtin procedure into `trace` and returns the
/// environment a program should be evaluated in.
pub fn install_builtins(trace: &mut Trace) -> Environment {
    let builtins: Vec<(&str, SP)> = vec![
        ("flip", flip::sp()),
        ("normal", normal::sp()),
        ("add", arithmetic::add_sp()),
        ("mul", arithmetic::mul_sp()),
        ("sub", arithmetic::sub_sp()),
        ("if", branch::sp()),
        ("mem", mem::sp()),
        ("dirichlet_multinomial", dirichlet_multinomial::sp()),
    ];

    let mut symbols = Vec::with_capacity(builtins.len());
    let mut nodes = Vec::with_capacity(builtins.len());
    for (name, sp) in builtins {
        let maker = trace.create_constant_node(Value::Nil);
        trace.install_made_sp(maker, sp, Box::new(UnitAux) as Box<dyn SPAux>);
        let operator = trace.create_constant_node(Value::SPRef(maker));
        symbols.push(name.to_string());
        nodes.push(operator);
    }

    extend_environment(&root_environment(), &symbols, &nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_resolves_in_the_returned_environment() {
        let mut trace = Trace::new();
        let env = install_builtins(&mut trace);
        for name in ["flip", "normal", "add", "mul", "sub", "if", "mem", "dirichlet_multinomial"] {
            venture_core::lookup_symbol(&env, name).unwrap_or_else(|_| panic!("{name} should be bound"));
        }
    }
}
