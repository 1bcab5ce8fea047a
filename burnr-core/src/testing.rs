//! A scripted [`CommandRunner`] for unit tests.
use crate::runner::{CommandOutput, CommandRunner};
use std::cell::RefCell;
use std::io;

type Handler = Box<dyn Fn(&[String]) -> io::Result<CommandOutput>>;

/// Records every invocation (program first, then args) and answers from a closure.
pub(crate) struct FakeRunner {
    calls: RefCell<Vec<Vec<String>>>,
    handler: Handler,
}

impl FakeRunner {
    pub(crate) fn new(handler: impl Fn(&[String]) -> io::Result<CommandOutput> + 'static) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    /// Invocations whose program and first argument match, e.g. `("hdiutil", "burn")`.
    pub(crate) fn calls_to(&self, program: &str, verb: &str) -> Vec<Vec<String>> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.first().map(String::as_str) == Some(program))
            .filter(|c| c.get(1).map(String::as_str) == Some(verb))
            .cloned()
            .collect()
    }

    fn invoke(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().cloned());
        self.calls.borrow_mut().push(call.clone());
        (self.handler)(&call)
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        self.invoke(program, args)
    }

    fn run_streaming(
        &self,
        program: &str,
        args: &[String],
        on_line: &mut dyn FnMut(&str),
    ) -> io::Result<CommandOutput> {
        let mut output = self.invoke(program, args)?;
        for line in output.stdout.lines() {
            on_line(line);
        }
        output.stdout.clear();
        Ok(output)
    }
}

pub(crate) fn ok(stdout: &str) -> io::Result<CommandOutput> {
    Ok(CommandOutput {
        success: true,
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

pub(crate) fn fail(stderr: &str) -> io::Result<CommandOutput> {
    Ok(CommandOutput {
        success: false,
        code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    })
}

/// The value following `flag` in an argument list.
pub(crate) fn arg_after<'a>(call: &'a [String], flag: &str) -> Option<&'a str> {
    call.iter()
        .position(|a| a == flag)
        .and_then(|i| call.get(i + 1))
        .map(String::as_str)
}
