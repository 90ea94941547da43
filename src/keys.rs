//! Key generation and key files.
//!
//! Two bundles are persisted with bincode:
//! - the secret file holds `{SchemeParameters, SecretKey, PublicKey}` and is
//!   all a client needs to encrypt and decrypt;
//! - the public file holds `{SchemeParameters, PublicKey, EvaluationKey}` and
//!   is all the server needs to compute lookups.
//!
//! Both embed the same parameters. Existing files are never overwritten.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bgv::{
    generate_evaluation_key, generate_public_key, generate_secret_key, BgvContext, EvaluationKey,
    PublicKey, SecretKey,
};
use crate::error::{ConfigError, Result};
use crate::math::GaussianSampler;
use crate::params::SchemeParameters;

pub const DEFAULT_SECRET_KEY_PATH: &str = "cipherkv.sk";
pub const DEFAULT_PUBLIC_KEY_PATH: &str = "cipherkv.pk";

#[derive(Serialize, Deserialize)]
struct SecretBundle {
    params: SchemeParameters,
    secret_key: SecretKey,
    public_key: PublicKey,
}

#[derive(Serialize, Deserialize)]
struct PublicBundle {
    params: SchemeParameters,
    public_key: PublicKey,
    evaluation_key: EvaluationKey,
}

/// Key material loaded by one process.
///
/// The secret key is present only on the decrypting side; the evaluation key
/// only where lookups are computed.
#[derive(Clone, Debug)]
pub struct KeyPair {
    params: SchemeParameters,
    public_key: PublicKey,
    evaluation_key: Option<EvaluationKey>,
    secret_key: Option<SecretKey>,
}

impl KeyPair {
    pub fn params(&self) -> &SchemeParameters {
        &self.params
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn evaluation_key(&self) -> Option<&EvaluationKey> {
        self.evaluation_key.as_ref()
    }

    pub fn secret_key(&self) -> Option<&SecretKey> {
        self.secret_key.as_ref()
    }

    /// The same key pair with the secret key removed.
    pub fn without_secret(&self) -> Self {
        Self {
            secret_key: None,
            ..self.clone()
        }
    }

    /// Write the secret and public bundles, refusing to replace existing files.
    pub fn save(&self, secret_path: impl AsRef<Path>, public_path: impl AsRef<Path>) -> Result<()> {
        let secret_path = secret_path.as_ref();
        let public_path = public_path.as_ref();

        let secret_key = self
            .secret_key
            .clone()
            .ok_or(ConfigError::MissingKeyMaterial("secret key"))?;
        let evaluation_key = self
            .evaluation_key
            .clone()
            .ok_or(ConfigError::MissingKeyMaterial("evaluation key"))?;

        for path in [secret_path, public_path] {
            if path.exists() {
                return Err(ConfigError::AlreadyExists(path.display().to_string()).into());
            }
        }

        write_new(
            secret_path,
            &SecretBundle {
                params: self.params.clone(),
                secret_key,
                public_key: self.public_key.clone(),
            },
        )?;

        let public = PublicBundle {
            params: self.params.clone(),
            public_key: self.public_key.clone(),
            evaluation_key,
        };
        if let Err(err) = write_new(public_path, &public) {
            // leave no half-written pair behind
            let _ = fs::remove_file(secret_path);
            return Err(err);
        }

        Ok(())
    }

    /// Load a client key pair (secret + public encryption key).
    pub fn load_secret(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bundle: SecretBundle = read_bundle(path)?;
        let keys = Self {
            params: bundle.params,
            public_key: bundle.public_key,
            evaluation_key: None,
            secret_key: Some(bundle.secret_key),
        };
        keys.check_shapes(path)?;
        Ok(keys)
    }

    /// Load a server key pair (public encryption key + evaluation key).
    pub fn load_public(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bundle: PublicBundle = read_bundle(path)?;
        let keys = Self {
            params: bundle.params,
            public_key: bundle.public_key,
            evaluation_key: Some(bundle.evaluation_key),
            secret_key: None,
        };
        keys.check_shapes(path)?;
        Ok(keys)
    }

    fn check_shapes(&self, path: &Path) -> Result<()> {
        let unreadable = |reason: String| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason,
        };

        self.params.validate()?;
        let n = self.params.ring_dim;
        let levels = self.params.level_count();

        if self.public_key.b.residue_count() != levels || self.public_key.b.dimension() != n {
            return Err(unreadable("public key does not match parameters".into()).into());
        }
        if let Some(sk) = &self.secret_key {
            if sk.ring_dim() != n {
                return Err(unreadable("secret key does not match parameters".into()).into());
            }
        }
        if let Some(ek) = &self.evaluation_key {
            if ek.relin.level_count() != levels {
                return Err(unreadable("evaluation key does not match parameters".into()).into());
            }
        }
        Ok(())
    }
}

fn write_new<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|err| match err.kind() {
            ErrorKind::AlreadyExists => ConfigError::AlreadyExists(path.display().to_string()),
            _ => ConfigError::Unreadable {
                path: path.display().to_string(),
                reason: err.to_string(),
            },
        })?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_bundle<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ConfigError::MissingKeyFile(path.display().to_string()),
        _ => ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: err.to_string(),
        },
    })?;
    let bundle = bincode::deserialize_from(BufReader::new(file)).map_err(|err| {
        ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    })?;
    Ok(bundle)
}

/// Derives fresh key pairs for one parameter set.
pub struct KeyGenerator {
    ctx: BgvContext,
    rng: ChaCha20Rng,
    sampler: GaussianSampler,
}

impl KeyGenerator {
    /// Generator seeded from operating-system entropy.
    pub fn new(params: SchemeParameters) -> Result<Self> {
        let mut rng = ChaCha20Rng::from_entropy();
        let sampler = GaussianSampler::from_rng(params.sigma, &mut rng);
        Ok(Self {
            ctx: BgvContext::new(params)?,
            rng,
            sampler,
        })
    }

    /// Deterministic generator; the same seed yields the same keys.
    pub fn with_seed(params: SchemeParameters, seed: u64) -> Result<Self> {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let sampler = GaussianSampler::from_rng(params.sigma, &mut rng);
        Ok(Self {
            ctx: BgvContext::new(params)?,
            rng,
            sampler,
        })
    }

    /// Generate a complete key pair (secret, public and evaluation keys).
    pub fn generate(&mut self) -> KeyPair {
        let start = Instant::now();
        let ctx = &self.ctx;

        let secret_key = generate_secret_key(ctx, &mut self.rng);
        let public_key = generate_public_key(ctx, &secret_key, &mut self.rng, &mut self.sampler);
        let evaluation_key =
            generate_evaluation_key(ctx, &secret_key, &mut self.rng, &mut self.sampler);

        debug!(
            "Generated keys in {:.2?}: {} rotation keys",
            start.elapsed(),
            evaluation_key.galois.len()
        );

        KeyPair {
            params: ctx.params().clone(),
            public_key,
            evaluation_key: Some(evaluation_key),
            secret_key: Some(secret_key),
        }
    }
}

/// Generate a key pair and persist it, failing with `AlreadyExists` if
/// either file is present.
pub fn generate(
    params: SchemeParameters,
    secret_path: impl AsRef<Path>,
    public_path: impl AsRef<Path>,
) -> Result<KeyPair> {
    let secret_path = secret_path.as_ref();
    let public_path = public_path.as_ref();

    for path in [secret_path, public_path] {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.display().to_string()).into());
        }
    }

    let keys = KeyGenerator::new(params)?.generate();
    keys.save(secret_path, public_path)?;

    info!(
        "Wrote {} (secret key) and {} (public key)",
        secret_path.display(),
        public_path.display()
    );
    Ok(keys)
}
