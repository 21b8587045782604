//! Individual environment checks. Each returns a finished [`Category`].

use super::report::{Category, Line};
use super::runner::{CommandRunner, CommandError};
use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum supported Python.
pub const MIN_PYTHON: (u32, u32) = (3, 12);

/// `(distribution name, import name)` for every AI/ML package checked.
pub const PACKAGES: &[(&str, &str)] = &[
    ("torch", "torch"),
    ("torchvision", "torchvision"),
    ("tensorflow", "tensorflow"),
    ("transformers", "transformers"),
    ("numpy", "numpy"),
    ("pandas", "pandas"),
    ("scikit-learn", "sklearn"),
    ("matplotlib", "matplotlib"),
    ("seaborn", "seaborn"),
    ("opencv-python", "cv2"),
    ("pillow", "PIL"),
    ("jupyter", "jupyter"),
    ("fastapi", "fastapi"),
    ("gradio", "gradio"),
    ("streamlit", "streamlit"),
    ("langchain", "langchain"),
];

/// Developer tools checked with `<tool> --version`.
pub const TOOLS: &[&str] = &[
    "git", "vim", "zsh", "docker", "cmake", "make", "gcc", "python", "pip",
];

/// Variables shown in the informational section.
pub const ENV_VARS: &[&str] = &["CUDA_HOME", "PATH", "LD_LIBRARY_PATH", "PYTHONPATH"];

const ENV_VALUE_PREVIEW: usize = 50;

static PYTHON_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Python\s+(\d+)\.(\d+)(?:\.(\d+))?").expect("valid regex"));

/// Parse `Python X.Y[.Z]` out of `python --version` output.
pub fn parse_python_version(text: &str) -> Option<(u32, u32, u32)> {
    let caps = PYTHON_VERSION.captures(text)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    let patch = caps
        .get(3)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    Some((major, minor, patch))
}

fn is_missing_module(stderr: &str) -> bool {
    stderr.contains("ModuleNotFoundError") || stderr.contains("No module named")
}

fn last_line(text: &str) -> &str {
    text.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

pub fn check_python_version(runner: &dyn CommandRunner, python: &str) -> Category {
    let mut c = Category::new("🐍", "Python Version Check");
    let version = match runner.run(python, &["--version"]) {
        Ok(out) => parse_python_version(&format!("{}\n{}", out.stdout, out.stderr)),
        Err(e) => {
            c.push(Line::fail(e.to_string()));
            return c;
        }
    };

    match version {
        Some((major, minor, patch)) => {
            c.push(Line::info(format!("Python version: {major}.{minor}.{patch}")));
            if (major, minor) >= MIN_PYTHON {
                c.push(Line::pass("Python 3.12+ is available"));
                c.passed = true;
            } else {
                c.push(Line::fail("Python 3.12+ is required"));
            }
        }
        None => c.push(Line::fail(format!("could not read the version of {python}"))),
    }
    c
}

const TORCH_CUDA_SCRIPT: &str = "import torch\n\
n = torch.cuda.device_count() if torch.cuda.is_available() else 0\n\
print(torch.cuda.is_available())\n\
print(n)\n\
print(torch.cuda.get_device_name(0) if n > 0 else '')";

pub fn check_cuda(runner: &dyn CommandRunner, python: &str) -> Category {
    let mut c = Category::new("🚀", "CUDA Check");

    match runner.run("nvidia-smi", &[]) {
        Ok(out) if out.success => c.push(Line::pass("nvidia-smi is available")),
        Ok(_) => {
            c.push(Line::fail("nvidia-smi failed"));
            return c;
        }
        Err(CommandError::NotFound { .. }) => {
            c.push(Line::fail("nvidia-smi not found"));
            return c;
        }
        Err(e) => {
            c.push(Line::fail(e.to_string()));
            return c;
        }
    }

    let out = match runner.run(python, &["-c", TORCH_CUDA_SCRIPT]) {
        Ok(out) => out,
        Err(e) => {
            c.push(Line::fail(e.to_string()));
            return c;
        }
    };
    if !out.success {
        if is_missing_module(&out.stderr) {
            c.push(Line::fail("PyTorch not installed"));
        } else {
            c.push(Line::fail(format!("PyTorch check failed: {}", last_line(&out.stderr))));
        }
        return c;
    }

    let mut lines = out.stdout.lines().map(str::trim);
    let available = lines.next() == Some("True");
    let count: usize = lines.next().and_then(|l| l.parse().ok()).unwrap_or(0);
    let name = lines.next().unwrap_or("");

    if available {
        c.push(Line::pass("PyTorch CUDA is available"));
        c.push(Line::gpu(format!("GPU count: {count}")));
        if count > 0 && !name.is_empty() {
            c.push(Line::gpu(format!("GPU name: {name}")));
        }
        c.passed = true;
    } else {
        c.push(Line::fail("PyTorch CUDA is not available"));
    }
    c
}

const TF_GPU_SCRIPT: &str =
    "import tensorflow as tf\nprint(len(tf.config.experimental.list_physical_devices('GPU')))";

pub fn check_tensorflow_gpu(runner: &dyn CommandRunner, python: &str) -> Category {
    let mut c = Category::new("🧠", "TensorFlow GPU Check");
    let out = match runner.run(python, &["-c", TF_GPU_SCRIPT]) {
        Ok(out) => out,
        Err(e) => {
            c.push(Line::fail(e.to_string()));
            return c;
        }
    };
    if !out.success {
        if is_missing_module(&out.stderr) {
            c.push(Line::fail("TensorFlow not installed"));
        } else {
            c.push(Line::fail(format!("TensorFlow check failed: {}", last_line(&out.stderr))));
        }
        return c;
    }

    // TensorFlow logs to stdout on some builds; the count is the last line.
    let gpus: usize = last_line(&out.stdout).parse().unwrap_or(0);
    if gpus > 0 {
        c.push(Line::pass("TensorFlow GPU is available"));
        c.push(Line::gpu(format!("GPU count: {gpus}")));
        c.passed = true;
    } else {
        c.push(Line::fail("TensorFlow GPU is not available"));
    }
    c
}

fn package_script(import_name: &str) -> String {
    format!(
        "import importlib\nm = importlib.import_module('{import_name}')\n\
         print(getattr(m, '__version__', 'unknown'))"
    )
}

pub fn check_packages(runner: &dyn CommandRunner, python: &str) -> Category {
    let mut c = Category::new("🤖", "AI/ML Packages Check");
    let mut available = 0;

    for &(name, import_name) in PACKAGES {
        let script = package_script(import_name);
        match runner.run(python, &["-c", &script]) {
            Ok(out) if out.success => {
                let version = last_line(&out.stdout);
                let version = if version.is_empty() { "unknown" } else { version };
                c.push(Line::pass(format!("{name} ({version})")));
                available += 1;
            }
            Ok(out) if is_missing_module(&out.stderr) => {
                c.push(Line::fail(format!("{name} not found")));
            }
            Ok(out) => {
                c.push(Line::fail(format!(
                    "{name} import error: {}",
                    last_line(&out.stderr)
                )));
            }
            Err(e) => c.push(Line::fail(format!("{name} import error: {e}"))),
        }
    }

    c.summary = Some(format!("Packages: {available}/{} available", PACKAGES.len()));
    c.passed = available == PACKAGES.len();
    c
}

pub fn check_tools(runner: &dyn CommandRunner) -> Category {
    let mut c = Category::new("🛠️", "Development Tools Check");
    let mut available = 0;

    for &tool in TOOLS {
        match runner.run(tool, &["--version"]) {
            Ok(out) if out.success => {
                c.push(Line::pass(format!("{tool}: {}", out.first_line())));
                available += 1;
            }
            Ok(_) => c.push(Line::fail(format!("{tool}: command failed"))),
            Err(CommandError::NotFound { .. }) => c.push(Line::fail(format!("{tool}: not found"))),
            Err(e) => c.push(Line::fail(e.to_string())),
        }
    }

    c.summary = Some(format!("Tools: {available}/{} available", TOOLS.len()));
    c.passed = available == TOOLS.len();
    c
}

/// First [`ENV_VALUE_PREVIEW`] characters, with `...` when cut.
pub fn preview_value(value: &str) -> String {
    match value.char_indices().nth(ENV_VALUE_PREVIEW) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}

/// Informational only: never affects the exit code.
pub fn check_environment(runner: &dyn CommandRunner) -> Category {
    let mut c = Category::new("🌍", "Environment Variables Check");
    for &var in ENV_VARS {
        match runner.env_var(var) {
            Some(value) => c.push(Line::pass(format!("{var}: {}", preview_value(&value)))),
            None => c.push(Line::fail(format!("{var}: not set"))),
        }
    }
    c.passed = true;
    c
}
