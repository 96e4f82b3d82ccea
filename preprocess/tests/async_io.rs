//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

#![cfg(feature = "async")]

use preprocess::{AsyncReadLines, Error, LineEnding, Options, Preprocessor};
use similar_asserts::assert_eq;
use tokio::io::BufReader;

const TEMPLATE: &str = "\
#define env=prod
#switch $<env>
#case dev
host = localhost
#default
host = $<env>.internal
#endswitch
// trailing comment
";

#[tokio::test]
async fn read_to_end() {
    let options = Options::builder()
        .remove_comments(true)
        .line_ending(LineEnding::Lf)
        .build()
        .unwrap();
    let source = AsyncReadLines::new(TEMPLATE.as_bytes());
    let mut preprocessor = Preprocessor::new(source, options);
    assert_eq!(
        preprocessor.read_to_end_async().await.unwrap(),
        "host = prod.internal\n"
    );
    assert_eq!(preprocessor.get("env"), Some("prod"));
}

#[tokio::test]
async fn read_line_by_line() {
    let source = AsyncReadLines::new(BufReader::with_capacity(3, "a\r\nb\rc".as_bytes()));
    let mut preprocessor = Preprocessor::new(source, Options::default());
    assert_eq!(preprocessor.read_line_async().await.unwrap().as_deref(), Some("a"));
    assert_eq!(preprocessor.read_line_async().await.unwrap().as_deref(), Some("b"));
    assert_eq!(preprocessor.read_line_async().await.unwrap().as_deref(), Some("c"));
    assert_eq!(preprocessor.read_line_async().await.unwrap(), None);
    assert_eq!(preprocessor.line_number(), 3);
}

#[tokio::test]
async fn unterminated_block() {
    let source = AsyncReadLines::new("#if a==a\nbody\n".as_bytes());
    let mut preprocessor = Preprocessor::new(source, Options::default());
    let error = preprocessor.read_to_end_async().await.unwrap_err();
    assert!(matches!(error, Error::Directive { line: 1, .. }));
}
