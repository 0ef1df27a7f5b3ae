//! Identity handshake for TCP connections.
//!
//! ```text
//! Dialer                                   Listener
//!   |-------- Hello { peer_id, nonce } ------>|
//!   |<------- Proof { public_key, signature } |
//! ```
//!
//! Frames are single JSON objects terminated by `\n`. The listener signs the
//! dialer's nonce (prefixed with a domain tag) with its Ed25519 key. The dialer
//! accepts the connection only if the key hashes to the identity it meant to
//! reach and the signature verifies.

use rendezvous_core::{Ed25519PublicKey, Ed25519Signature, Keypair, PeerId};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{NetError, Result};

/// Domain tag prepended to the nonce before signing.
const PROOF_DOMAIN: &[u8] = b"rendezvous-handshake-v0:";

/// Largest accepted frame, newline included.
pub const MAX_FRAME_BYTES: usize = 4 * 1024;

/// Handshake frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandshakeMessage {
    /// Dialer introduces itself and issues a challenge.
    Hello { peer_id: PeerId, nonce: String },
    /// Listener proves ownership of its identity.
    Proof {
        public_key: String,
        signature: String,
    },
}

fn proof_message(nonce: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(PROOF_DOMAIN.len() + nonce.len());
    message.extend_from_slice(PROOF_DOMAIN);
    message.extend_from_slice(nonce);
    message
}

async fn write_frame<W>(writer: &mut W, message: &HandshakeMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame =
        serde_json::to_vec(message).map_err(|e| NetError::Handshake(e.to_string()))?;
    frame.push(b'\n');
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_frame<R>(reader: &mut R) -> Result<HandshakeMessage>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader
        .take(MAX_FRAME_BYTES as u64)
        .read_line(&mut line)
        .await?;

    if read == 0 {
        return Err(NetError::Handshake("connection closed".into()));
    }
    if !line.ends_with('\n') {
        return Err(NetError::Handshake(format!(
            "frame exceeds {MAX_FRAME_BYTES} bytes"
        )));
    }

    serde_json::from_str(line.trim_end()).map_err(|e| NetError::Handshake(e.to_string()))
}

/// Run the dialer side: challenge the listener and check it is `expected`.
pub async fn initiate<S>(stream: S, local: PeerId, expected: &PeerId) -> Result<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    let nonce: [u8; 32] = rand::random();

    write_frame(
        &mut stream,
        &HandshakeMessage::Hello {
            peer_id: local,
            nonce: hex::encode(nonce),
        },
    )
    .await?;

    let (public_key, signature) = match read_frame(&mut stream).await? {
        HandshakeMessage::Proof {
            public_key,
            signature,
        } => (public_key, signature),
        other => {
            return Err(NetError::Handshake(format!(
                "expected proof, got {other:?}"
            )))
        }
    };

    let public_key = Ed25519PublicKey::from_hex(&public_key)?;
    if public_key.peer_id() != *expected {
        return Err(NetError::Handshake(format!(
            "listener is {}, expected {expected}",
            public_key.peer_id()
        )));
    }

    let signature = Ed25519Signature::from_hex(&signature)?;
    public_key
        .verify(&proof_message(&nonce), &signature)
        .map_err(|_| NetError::Handshake("bad identity proof".into()))?;

    Ok(stream.into_inner())
}

/// Run the listener side: answer the challenge with `keypair`.
///
/// Returns the identity the dialer claims. The claim is not verified.
pub async fn respond<S>(stream: S, keypair: &Keypair) -> Result<(S, PeerId)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);

    let (dialer, nonce) = match read_frame(&mut stream).await? {
        HandshakeMessage::Hello { peer_id, nonce } => (peer_id, nonce),
        other => {
            return Err(NetError::Handshake(format!(
                "expected hello, got {other:?}"
            )))
        }
    };
    let nonce = hex::decode(&nonce).map_err(|e| NetError::Handshake(e.to_string()))?;

    let signature = keypair.sign(&proof_message(&nonce));
    write_frame(
        &mut stream,
        &HandshakeMessage::Proof {
            public_key: keypair.public_key().to_hex(),
            signature: signature.to_hex(),
        },
    )
    .await?;

    Ok((stream.into_inner(), dialer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handshake_succeeds_for_expected_identity() {
        let (dialer_io, listener_io) = tokio::io::duplex(MAX_FRAME_BYTES);
        let dialer = Keypair::generate();
        let listener = Keypair::generate();
        let expected = listener.peer_id();

        let responder = tokio::spawn(async move { respond(listener_io, &listener).await });
        initiate(dialer_io, dialer.peer_id(), &expected)
            .await
            .unwrap();

        let (_, claimed) = responder.await.unwrap().unwrap();
        assert_eq!(claimed, dialer.peer_id());
    }

    #[tokio::test]
    async fn test_handshake_rejects_wrong_identity() {
        let (dialer_io, listener_io) = tokio::io::duplex(MAX_FRAME_BYTES);
        let listener = Keypair::generate();
        let someone_else = Keypair::generate().peer_id();

        tokio::spawn(async move { respond(listener_io, &listener).await });
        let err = initiate(dialer_io, PeerId::from_bytes([1; 32]), &someone_else)
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::Handshake(_)));
    }

    #[tokio::test]
    async fn test_handshake_rejects_forged_signature() {
        let (dialer_io, listener_io) = tokio::io::duplex(MAX_FRAME_BYTES);
        let claimed = Keypair::generate();
        let forger = Keypair::generate();
        let expected = claimed.peer_id();

        // Presents the claimed key but signs with a different one.
        tokio::spawn(async move {
            let mut stream = BufReader::new(listener_io);
            let nonce = match read_frame(&mut stream).await.unwrap() {
                HandshakeMessage::Hello { nonce, .. } => hex::decode(nonce).unwrap(),
                other => panic!("unexpected {other:?}"),
            };
            let proof = HandshakeMessage::Proof {
                public_key: claimed.public_key().to_hex(),
                signature: forger.sign(&proof_message(&nonce)).to_hex(),
            };
            write_frame(&mut stream, &proof).await.unwrap();
        });

        let err = initiate(dialer_io, PeerId::from_bytes([2; 32]), &expected)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad identity proof"));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut dialer_io, listener_io) = tokio::io::duplex(MAX_FRAME_BYTES * 2);
        let listener = Keypair::generate();

        dialer_io
            .write_all(&vec![b'x'; MAX_FRAME_BYTES + 1])
            .await
            .unwrap();
        let err = respond(listener_io, &listener).await.unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        fn respond_to(bytes: Vec<u8>) -> Result<(tokio::io::DuplexStream, PeerId)> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let (mut dialer_io, listener_io) = tokio::io::duplex(MAX_FRAME_BYTES * 2);
                dialer_io.write_all(&bytes).await.unwrap();
                drop(dialer_io);
                respond(listener_io, &Keypair::generate()).await
            })
        }

        proptest! {
            #[test]
            fn prop_arbitrary_hello_line_is_rejected(
                bytes in proptest::collection::vec(any::<u8>(), 0..MAX_FRAME_BYTES - 1)
            ) {
                let mut line = bytes;
                line.push(b'\n');
                prop_assert!(respond_to(line).is_err());
            }

            #[test]
            fn prop_proof_in_place_of_hello_is_rejected(nonce in any::<[u8; 32]>()) {
                let signer = Keypair::generate();
                let mut line = serde_json::to_vec(&HandshakeMessage::Proof {
                    public_key: signer.public_key().to_hex(),
                    signature: signer.sign(&proof_message(&nonce)).to_hex(),
                })
                .unwrap();
                line.push(b'\n');

                let err = respond_to(line).unwrap_err();
                prop_assert!(matches!(err, NetError::Handshake(_)));
            }
        }
    }
}
