use std::{env, fs, path::PathBuf, process::Command};

fn run_bin(args: &[&str]) -> bool {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_epiloc"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");
    if !output.status.success() {
        eprintln!("binary failed with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n");
    }

    output.status.success()
}

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(run_bin(&["--exp-dir", test_dir_str, "init"]));
    assert!(test_dir.join("config.toml").is_file());
    assert!(!run_bin(&["--exp-dir", test_dir_str, "init"]));

    assert!(run_bin(&["--exp-dir", test_dir_str, "analyze"]));
    assert!(test_dir.join("results.msgpack").is_file());

    assert!(run_bin(&["--exp-dir", test_dir_str, "check", "--n-points", "50"]));
    assert!(!run_bin(&["--exp-dir", test_dir_str, "check", "--n-points", "1"]));

    assert!(run_bin(&["--exp-dir", test_dir_str, "plot"]));
    for name in ["r_inf.svg", "prob.svg", "cost.svg", "uniform_cost.svg"] {
        assert!(test_dir.join(name).is_file(), "missing {name}");
    }

    assert!(run_bin(&["--exp-dir", test_dir_str, "clean"]));
    assert!(!test_dir.join("results.msgpack").exists());
    assert!(!test_dir.join("cost.svg").exists());
    assert!(test_dir.join("config.toml").is_file());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn custom_config() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("custom_config");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_contents = String::new()
        + "[[scenarios]]\n"
        + "label = \"expensive locations\"\n"
        + "r_0 = 5.0\n"
        + "eta = 0.05\n"
        + "cost_loc = 0.2\n"
        + "\n"
        + "[search]\n"
        + "max_n_loc = 1000\n"
        + "\n"
        + "[plot]\n"
        + "n_points = 200\n"
        + "xi_min = 0.01\n"
        + "cost_max = 3.0\n"
        + "n_loc_max = 12\n"
        + "n_loc_cost = 10\n"
        + "width = 800\n"
        + "height = 600\n";

    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(run_bin(&["--exp-dir", test_dir_str, "analyze"]));
    assert!(run_bin(&["--exp-dir", test_dir_str, "plot"]));
    assert!(run_bin(&["--exp-dir", test_dir_str, "clean"]));

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn rejects_invalid_config() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("rejects_invalid_config");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_contents = String::new()
        + "[[scenarios]]\n"
        + "label = \"no epidemic\"\n"
        + "r_0 = 0.0\n"
        + "eta = 0.001\n"
        + "cost_loc = 0.01\n"
        + "\n"
        + "[search]\n"
        + "max_n_loc = 1000\n"
        + "\n"
        + "[plot]\n"
        + "n_points = 200\n"
        + "xi_min = 0.01\n"
        + "cost_max = 3.0\n"
        + "n_loc_max = 12\n"
        + "n_loc_cost = 10\n"
        + "width = 800\n"
        + "height = 600\n";

    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(!run_bin(&["--exp-dir", test_dir_str, "analyze"]));
    assert!(!run_bin(&["--exp-dir", test_dir_str, "plot"]));

    fs::remove_dir_all(&test_dir).ok();
}
