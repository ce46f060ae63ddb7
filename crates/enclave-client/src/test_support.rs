// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Throwaway PKI, quotes, sessions and a mock enclave for the unit tests

use crate::attestation::chain::{parse_chain_pem, TrustAnchor};
use crate::attestation::reportdata::KeyBinding;
use crate::client::service::{DiscoveryFeedback, EnclaveResponse, EnclaveToken, RequestBody};
use crate::client::transport::{
    EnclaveRequest, FeedbackRequest, QuoteRequest, QuoteResponse, RemoteAttestationAuth,
    TokenRequest, Transport,
};
use crate::crypto::kdf::{derive_keys, SealedBox, SessionKeys};
use crate::crypto::{envelope, CryptoProvider, OsCryptoProvider};
use crate::error::NetworkError;
use crate::quote::Quote;
use crate::session::{AttestationSession, SessionPolicy};
use async_trait::async_trait;
use p256::ecdsa::{DerSignature, SigningKey};
use p256::PublicKey;
use signature::Signer;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use x509_cert::{
    builder::{Builder, CertificateBuilder, Profile},
    der::{pem::LineEnding, EncodePem},
    name::Name,
    serial_number::SerialNumber,
    spki::{EncodePublicKey, SubjectPublicKeyInfoOwned},
    time::Validity,
    Certificate,
};

/// A root and one leaf certificate, both P-256, valid for a day
pub struct TestPki {
    pub root_pem: String,
    pub chain_pem: String,
    root_key: SigningKey,
    leaf_key: SigningKey,
}

fn signing_key() -> SigningKey {
    let pair = OsCryptoProvider.generate_key_pair().unwrap();
    SigningKey::from(pair.secret())
}

fn spki(key: &SigningKey) -> SubjectPublicKeyInfoOwned {
    let der = key.verifying_key().to_public_key_der().unwrap();
    SubjectPublicKeyInfoOwned::try_from(der.as_bytes()).unwrap()
}

fn validity() -> Validity {
    Validity::from_now(Duration::from_secs(60 * 60 * 24)).unwrap()
}

/// A certificate for `CN=<subject_cn>` with a fresh key, signed by `signer`
pub fn issue_certificate(
    profile: Profile,
    subject_cn: &str,
    signer: &SigningKey,
) -> (Certificate, SigningKey) {
    let key = signing_key();
    let certificate = CertificateBuilder::new(
        profile,
        SerialNumber::new(&[2]).unwrap(),
        validity(),
        Name::from_str(&format!("CN={subject_cn}")).unwrap(),
        spki(&key),
        signer,
    )
    .unwrap()
    .build::<DerSignature>()
    .unwrap();
    (certificate, key)
}

impl TestPki {
    pub fn new(root_cn: &str) -> Self {
        let root_key = signing_key();
        let root_name = Name::from_str(&format!("CN={root_cn}")).unwrap();
        let root = CertificateBuilder::new(
            Profile::Root,
            SerialNumber::new(&[1]).unwrap(),
            validity(),
            root_name.clone(),
            spki(&root_key),
            &root_key,
        )
        .unwrap()
        .build::<DerSignature>()
        .unwrap();

        let (leaf, leaf_key) = issue_certificate(
            Profile::Leaf {
                issuer: root_name,
                enable_key_agreement: false,
                enable_key_encipherment: false,
            },
            "Attestation Signer",
            &root_key,
        );

        let root_pem = root.to_pem(LineEnding::LF).unwrap();
        let chain_pem = leaf.to_pem(LineEnding::LF).unwrap() + &root_pem;
        Self {
            root_pem,
            chain_pem,
            root_key,
            leaf_key,
        }
    }

    pub fn root_key(&self) -> &SigningKey {
        &self.root_key
    }

    pub fn leaf_key(&self) -> &SigningKey {
        &self.leaf_key
    }

    /// DER ECDSA signature of the leaf over `message`
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: DerSignature = self.leaf_key.sign(message);
        signature.as_bytes().to_vec()
    }

    pub fn anchor(&self) -> TrustAnchor {
        TrustAnchor::from_pem(&self.root_pem).unwrap()
    }

    pub fn chain(&self) -> Vec<Certificate> {
        parse_chain_pem(&self.chain_pem).unwrap()
    }
}

/// A fresh server ephemeral key, SEC1 uncompressed
pub fn server_key() -> Vec<u8> {
    OsCryptoProvider
        .generate_key_pair()
        .unwrap()
        .public_key_bytes()
}

/// A production-mode quote of `mrenclave` binding `server_key`
pub fn test_quote(mrenclave: [u8; 32], server_key: &[u8]) -> Quote {
    Quote {
        version: 2,
        sign_type: 1,
        gid: 0x0b0a,
        qe_svn: 7,
        pce_svn: 6,
        basename: [0x11; 32],
        cpu_svn: [0x22; 16],
        misc_select: 0,
        flags: 0x05,
        xfrm: 0x07,
        mrenclave,
        mrsigner: [0x33; 32],
        isv_prod_id: 0,
        isv_svn: 1,
        report_data: KeyBinding::for_key(server_key).into(),
        signature: vec![0xee; 16],
    }
}

fn random_keys() -> [u8; 32] {
    let mut key = [0u8; 32];
    OsCryptoProvider.fill_random(&mut key).unwrap();
    key
}

/// A client session and the enclave's view of it, with swapped directions
pub fn session_pair(policy: SessionPolicy) -> (AttestationSession, AttestationSession) {
    let client_pair = OsCryptoProvider.generate_key_pair().unwrap();
    let server_pair = OsCryptoProvider.generate_key_pair().unwrap();
    let client_public = *client_pair.public_key();
    let server_public = *server_pair.public_key();
    let (c2s, s2c) = (random_keys(), random_keys());
    let request_id = b"request-id".to_vec();
    let cookies = vec!["session=1".to_string()];

    let client = AttestationSession::new(
        "cds".into(),
        client_pair,
        server_public,
        SessionKeys::new(c2s, s2c),
        request_id.clone(),
        cookies.clone(),
        policy,
        [1, 2, 3, 4],
    );
    let enclave = AttestationSession::new(
        "cds".into(),
        server_pair,
        client_public,
        SessionKeys::new(s2c, c2s),
        request_id,
        cookies,
        policy,
        [5, 6, 7, 8],
    );
    (client, enclave)
}

/// Speaks the server side of the handshake and request protocol
pub struct MockEnclave {
    pub pki: TestPki,
    pub mrenclave: [u8; 32],
    pub quote_delay: Duration,
    pub handshakes: AtomicUsize,
    pub requests: AtomicUsize,
    /// corrupt the tag of this many upcoming responses
    pub corrupt_responses: AtomicUsize,
    /// answer this many upcoming requests with `Unauthorized`
    pub reject_requests: AtomicUsize,
    /// fail this many upcoming handshakes as unreachable
    pub fail_handshakes: AtomicUsize,
    pub corrupt_sealed_request_id: AtomicBool,
    /// panic in this many upcoming handshakes
    pub panic_handshakes: AtomicUsize,
    pub tokens: AtomicUsize,
    /// answer this many upcoming token requests with `Unauthorized`
    pub reject_tokens: AtomicUsize,
    pub feedback: Mutex<Vec<DiscoveryFeedback>>,
    pub last_auth: Mutex<Option<RemoteAttestationAuth>>,
    pub last_cookies: Mutex<Vec<String>>,
    sessions: Mutex<HashMap<Vec<u8>, SessionKeys>>,
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn bad_request(message: &str) -> NetworkError {
    NetworkError::ServerError {
        status: 400,
        message: message.into(),
    }
}

impl MockEnclave {
    pub fn new(mrenclave: [u8; 32]) -> Self {
        Self {
            pki: TestPki::new("Attestation Root"),
            mrenclave,
            quote_delay: Duration::ZERO,
            handshakes: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            corrupt_responses: AtomicUsize::new(0),
            reject_requests: AtomicUsize::new(0),
            fail_handshakes: AtomicUsize::new(0),
            corrupt_sealed_request_id: AtomicBool::new(false),
            panic_handshakes: AtomicUsize::new(0),
            tokens: AtomicUsize::new(0),
            reject_tokens: AtomicUsize::new(0),
            feedback: Mutex::new(Vec::new()),
            last_auth: Mutex::new(None),
            last_cookies: Mutex::new(Vec::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> usize {
        self.tokens.load(Ordering::SeqCst)
    }
}

fn session_cookie(request_id: &[u8]) -> String {
    format!("session={}", hex::encode(request_id))
}

#[async_trait]
impl Transport for MockEnclave {
    async fn fetch_quote(&self, request: QuoteRequest) -> Result<QuoteResponse, NetworkError> {
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        *self.last_auth.lock().unwrap() = Some(request.auth.clone());
        if !self.quote_delay.is_zero() {
            tokio::time::sleep(self.quote_delay).await;
        }
        if take_one(&self.panic_handshakes) {
            panic!("mock enclave transport failed");
        }
        if take_one(&self.fail_handshakes) {
            return Err(NetworkError::Unreachable("mock enclave down".into()));
        }

        let client_public = PublicKey::from_sec1_bytes(&request.client_public_key)
            .map_err(|_| bad_request("invalid client key"))?;
        let server_pair = OsCryptoProvider.generate_key_pair().unwrap();
        let server_public = server_pair.public_key_bytes();

        let quote = test_quote(self.mrenclave, &server_public);
        let signature = self.pki.sign(&quote.header_bytes());

        let shared = p256::ecdh::diffie_hellman(
            server_pair.secret().to_nonzero_scalar(),
            client_public.as_affine(),
        );
        let keys = derive_keys(
            shared.raw_secret_bytes().as_slice(),
            &request.client_public_key,
            &server_public,
            &request.enclave_name,
            &quote.digest(),
        )
        .unwrap();

        let mut request_id = vec![0u8; 16];
        OsCryptoProvider.fill_random(&mut request_id).unwrap();
        let mut iv = [0u8; 12];
        OsCryptoProvider.fill_random(&mut iv).unwrap();
        let (ciphertext, mut mac) = envelope::seal(keys.server(), &iv, &[], &request_id).unwrap();
        if self.corrupt_sealed_request_id.load(Ordering::SeqCst) {
            mac[0] ^= 1;
        }

        let cookies = vec![session_cookie(&request_id)];
        self.sessions.lock().unwrap().insert(request_id, keys);

        Ok(QuoteResponse {
            server_ephemeral_public: server_public,
            quote: quote.to_bytes(),
            certificates: self.pki.chain_pem.clone(),
            signature,
            attested_at: Some(SystemTime::now()),
            sealed_request_id: SealedBox {
                iv: iv.to_vec(),
                ciphertext,
                mac: mac.to_vec(),
            },
            cookies,
        })
    }

    async fn send_request(
        &self,
        request: EnclaveRequest,
    ) -> Result<EnclaveResponse, NetworkError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.last_cookies.lock().unwrap() = request.cookies.clone();
        if take_one(&self.reject_requests) {
            return Err(NetworkError::Unauthorized);
        }

        let (request_id, data, iv, mac) = match &request.body {
            RequestBody::ContactDiscovery(r) => (&r.request_id, &r.data, &r.iv, &r.mac),
            RequestBody::KeyBackup(r) => (&r.request_id, &r.data, &r.iv, &r.mac),
        };

        let sessions = self.sessions.lock().unwrap();
        let keys = sessions
            .get(request_id)
            .ok_or(NetworkError::Unauthorized)?;
        let plaintext = envelope::open(keys.client(), iv, request_id, data, mac)
            .map_err(|_| bad_request("bad mac"))?;

        let mut reply = b"reply:".to_vec();
        reply.extend_from_slice(&plaintext);
        let mut reply_iv = [0u8; 12];
        OsCryptoProvider.fill_random(&mut reply_iv).unwrap();
        let (ciphertext, mut reply_mac) =
            envelope::seal(keys.server(), &reply_iv, request_id, &reply).unwrap();
        if take_one(&self.corrupt_responses) {
            reply_mac[0] ^= 1;
        }

        Ok(EnclaveResponse {
            iv: reply_iv.to_vec(),
            ciphertext,
            mac: reply_mac.to_vec(),
        })
    }

    async fn fetch_token(&self, request: TokenRequest) -> Result<EnclaveToken, NetworkError> {
        self.tokens.fetch_add(1, Ordering::SeqCst);
        *self.last_cookies.lock().unwrap() = request.cookies.clone();
        if take_one(&self.reject_tokens) {
            return Err(NetworkError::Unauthorized);
        }
        let sessions = self.sessions.lock().unwrap();
        let request_id = sessions
            .keys()
            .find(|id| request.cookies.contains(&session_cookie(id)))
            .ok_or(NetworkError::Unauthorized)?;
        Ok(EnclaveToken {
            backup_id: request_id.clone(),
            token: vec![0x42; 32],
            tries: 10,
        })
    }

    async fn send_feedback(&self, request: FeedbackRequest) -> Result<(), NetworkError> {
        *self.last_auth.lock().unwrap() = Some(request.auth);
        self.feedback.lock().unwrap().push(request.feedback);
        Ok(())
    }
}
