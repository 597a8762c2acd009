use super::Flag;

/// Split a flag string into arguments, honouring single and double quotes.
pub fn split_arguments(input: &str) -> Vec<String> {
    let mut arguments = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    for ch in input.chars() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_token = true;
            }
            None if ch.is_whitespace() => {
                if in_token {
                    arguments.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(ch);
                in_token = true;
            }
        }
    }
    if in_token {
        arguments.push(current);
    }
    arguments
}

/// Classify every argument of `input` into a typed [`Flag`], in order.
pub fn parse_flags(input: &str) -> Vec<Flag> {
    let arguments = split_arguments(input);
    let mut flags = Vec::with_capacity(arguments.len());
    let mut iter = arguments.into_iter();
    while let Some(argument) = iter.next() {
        let flag = match argument.as_str() {
            "-D" | "-I" | "-L" | "-l" | "-T" => match iter.next() {
                Some(value) => classify(&format!("{}{}", argument, value)),
                None => Flag::raw(argument),
            },
            _ => classify(&argument),
        };
        flags.push(flag);
    }
    flags
}

/// Parse each entry of `sources` and concatenate the results.
pub fn parse_all<I, S>(sources: I) -> Vec<Flag>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    sources
        .into_iter()
        .flat_map(|source| parse_flags(source.as_ref()))
        .collect()
}

fn classify(argument: &str) -> Flag {
    if let Some(value) = argument.strip_prefix("-D") {
        return Flag::define(value);
    }
    if let Some(value) = argument.strip_prefix("-I") {
        return Flag::include_path(value);
    }
    if let Some(value) = argument.strip_prefix("-L") {
        return Flag::library_path(value);
    }
    if let Some(value) = argument.strip_prefix("-l") {
        return Flag::library(value);
    }
    if argument.starts_with("-Wl,") || argument.starts_with("-T") {
        return Flag::link(argument);
    }
    Flag::raw(argument)
}
