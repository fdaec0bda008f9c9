//! Command line tokenizer.
//!
//! Splits a human-typed command such as `SET greeting "hello world"` into
//! the words sent as a request. Words are separated by whitespace; double
//! quotes group a word and understand `\n`, `\r`, `\t`, `\"` and `\\`;
//! single quotes group a word literally, with `\'` for a quote.

use crate::error::{Error, Result};
use std::iter::Peekable;
use std::str::Chars;

pub fn split_args(line: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            chars.next();
            match c {
                '"' => read_double_quoted(&mut chars, &mut word)?,
                '\'' => read_single_quoted(&mut chars, &mut word)?,
                _ => word.push(c),
            }
        }
        args.push(word);
    }

    Ok(args)
}

fn read_double_quoted(chars: &mut Peekable<Chars<'_>>, word: &mut String) -> Result<()> {
    while let Some(c) = chars.next() {
        match c {
            '"' => return Ok(()),
            '\\' => match chars.next() {
                Some('n') => word.push('\n'),
                Some('r') => word.push('\r'),
                Some('t') => word.push('\t'),
                Some(other) => word.push(other),
                None => break,
            },
            _ => word.push(c),
        }
    }
    Err(Error::UnterminatedQuote)
}

fn read_single_quoted(chars: &mut Peekable<Chars<'_>>, word: &mut String) -> Result<()> {
    while let Some(c) = chars.next() {
        match c {
            '\'' => return Ok(()),
            '\\' if chars.peek() == Some(&'\'') => {
                chars.next();
                word.push('\'');
            }
            _ => word.push(c),
        }
    }
    Err(Error::UnterminatedQuote)
}
