#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toolchain {
    pub prefix: String,
    pub ar: String,
    pub cc: String,
    pub cxx: String,
    pub gdb: String,
    pub objcopy: String,
    pub size: String,
    pub ar_flags: Vec<String>,
    /// Sections counted against flash in the size check.
    pub program_sections: Vec<String>,
    /// Sections counted against RAM in the size check.
    pub data_sections: Vec<String>,
}

impl Toolchain {
    pub fn for_prefix(prefix: &str) -> Self {
        let tool = |name: &str| format!("{}-{}", prefix, name);
        Self {
            prefix: prefix.to_string(),
            ar: tool("ar"),
            cc: tool("gcc"),
            cxx: tool("g++"),
            gdb: tool("gdb"),
            objcopy: tool("objcopy"),
            size: tool("size"),
            ar_flags: vec!["rc".to_string()],
            program_sections: to_strings(&[
                ".text",
                ".data",
                ".rodata",
                ".text.align",
                ".ARM.exidx",
            ]),
            data_sections: to_strings(&[".data", ".bss", ".noinit"]),
        }
    }

    pub fn is_gcc(&self) -> bool {
        self.cc.ends_with("gcc")
    }

    /// Arguments of the `size` invocation that echoes a Berkeley-format report.
    pub fn size_print_args(&self) -> Vec<String> {
        to_strings(&["-B", "-d"])
    }

    /// Arguments of the `size` invocation whose System V output is parsed.
    pub fn size_check_args(&self) -> Vec<String> {
        to_strings(&["-A", "-d"])
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::for_prefix(crate::config::DEFAULT_TOOLCHAIN_PREFIX)
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
