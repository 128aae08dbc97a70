// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use base64::{self, engine::general_purpose, DecodeError, Engine as _};

/// decodes bytes from an unpadded base64url string, the encoding of JWS
/// segments and of JWK key parameters
pub fn decode_str(v: &str) -> Result<Vec<u8>, DecodeError> {
    general_purpose::URL_SAFE_NO_PAD.decode(v)
}
