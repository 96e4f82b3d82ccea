//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::io::BufWriter;

use clap::Parser;
use preprocess::GetExitCode;

fn main() {
    env_logger::init();
    let args = preprocess::Args::parse();

    let stdout = BufWriter::new(std::io::stdout().lock());
    let stderr = std::io::stderr();
    let result = preprocess::run(stdout, stderr, args);
    std::process::exit(result.get_exit_code())
}
