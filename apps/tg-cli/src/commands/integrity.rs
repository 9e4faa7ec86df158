// integrity.rs — Integrity subcommands: generate, keygen, sign, verify.
//
// The manifest, its signature, and the public key live under
// .toolgate/integrity/. The signing key never does: keygen writes it to
// the path the operator names.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use tg_gate::GateConfig;
use tg_integrity::{
    generate_keypair, sign_manifest_file, IntegrityCheck, IntegrityError, IntegrityManifest,
    IntegrityReport, ManifestVerifier, SignedManifestVerifier,
};

#[derive(Subcommand)]
pub enum IntegrityCommands {
    /// Hash trusted artifacts into the manifest.
    Generate {
        /// Paths relative to the project root (defaults to `integrity_targets` in gate.toml).
        targets: Vec<String>,
    },
    /// Generate an Ed25519 key pair for signing the manifest.
    Keygen {
        /// Where to write the base64 PKCS#8 signing key.
        #[arg(long)]
        secret_key: PathBuf,
    },
    /// Sign the manifest with a signing key.
    Sign {
        /// Base64 PKCS#8 signing key produced by `keygen`.
        #[arg(long)]
        secret_key: PathBuf,
    },
    /// Verify trusted artifacts against the manifest.
    Verify {
        /// Also require a valid signature (implied by `require_signed_manifest`).
        #[arg(long)]
        signed: bool,
    },
}

pub fn execute(cmd: &IntegrityCommands, config: &GateConfig) -> anyhow::Result<()> {
    match cmd {
        IntegrityCommands::Generate { targets } => {
            let manifest = generate(config, targets)?;
            println!(
                "Wrote {} with {} artifact(s).",
                config.manifest_path.display(),
                manifest.files.len()
            );
            for (path, digest) in &manifest.files {
                println!("  {}  {}", digest, path);
            }
        }

        IntegrityCommands::Keygen { secret_key } => {
            keygen(config, secret_key)?;
            println!("Signing key:  {}", secret_key.display());
            println!("Public key:   {}", config.public_key_path.display());
        }

        IntegrityCommands::Sign { secret_key } => {
            sign(config, secret_key)?;
            println!("Signed {} -> {}", config.manifest_path.display(), config.signature_path.display());
        }

        IntegrityCommands::Verify { signed } => {
            let signed = *signed || config.options.require_signed_manifest;
            match verify(config, signed) {
                Ok(report) => println!(
                    "Integrity verified: {} artifact(s) match manifest v{}{}.",
                    report.count,
                    report.version,
                    if signed { ", signature valid" } else { "" }
                ),
                Err(IntegrityError::Failed { failures }) => {
                    println!("INTEGRITY FAILURE:");
                    for f in &failures {
                        println!(
                            "  {}: {} (expected {}, found {})",
                            f.path,
                            f.reason,
                            f.expected,
                            f.actual.as_deref().unwrap_or("nothing")
                        );
                    }
                    anyhow::bail!("Integrity check failed");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

fn generate(config: &GateConfig, targets: &[String]) -> anyhow::Result<IntegrityManifest> {
    let targets: &[String] = if targets.is_empty() {
        &config.options.integrity_targets
    } else {
        targets
    };
    if targets.is_empty() {
        anyhow::bail!(
            "No targets given and no integrity_targets in {}",
            config.options_path().display()
        );
    }
    let manifest = IntegrityManifest::generate(&config.project_root, targets)?;
    manifest.write(&config.manifest_path)?;
    Ok(manifest)
}

fn keygen(config: &GateConfig, secret_key: &Path) -> anyhow::Result<()> {
    if secret_key.exists() {
        anyhow::bail!("{} already exists; refusing to overwrite", secret_key.display());
    }
    let pair = generate_keypair()?;
    write_with_parent(secret_key, &pair.pkcs8)?;
    write_with_parent(&config.public_key_path, &pair.public_key)?;
    Ok(())
}

fn sign(config: &GateConfig, secret_key: &Path) -> anyhow::Result<()> {
    let pkcs8 = std::fs::read_to_string(secret_key)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", secret_key.display(), e))?;
    sign_manifest_file(&pkcs8, &config.manifest_path, &config.signature_path)?;
    Ok(())
}

fn verify(config: &GateConfig, signed: bool) -> Result<IntegrityReport, IntegrityError> {
    let plain = ManifestVerifier::new(&config.project_root, &config.manifest_path);
    if signed {
        SignedManifestVerifier::new(plain, &config.signature_path, &config.public_key_path).verify()
    } else {
        plain.verify()
    }
}

fn write_with_parent(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{}\n", contents))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tg_gate::GateOptions;

    fn project() -> (TempDir, GateConfig) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("rules.yaml"), "version: v2\n").unwrap();
        let config = GateConfig::for_project(dir.path()).with_options(GateOptions {
            integrity_targets: vec!["rules.yaml".to_string()],
            ..GateOptions::default()
        });
        (dir, config)
    }

    #[test]
    fn generate_uses_configured_targets() {
        let (_dir, config) = project();
        let manifest = generate(&config, &[]).unwrap();
        assert_eq!(manifest.files.keys().collect::<Vec<_>>(), vec!["rules.yaml"]);
        assert_eq!(verify(&config, false).unwrap().count, 1);
    }

    #[test]
    fn generate_without_targets_fails() {
        let dir = TempDir::new().unwrap();
        let config = GateConfig::for_project(dir.path());
        assert!(generate(&config, &[]).is_err());
    }

    #[test]
    fn keygen_sign_verify() {
        let (dir, config) = project();
        let key = dir.path().join("keys/signing.key");
        generate(&config, &[]).unwrap();
        keygen(&config, &key).unwrap();
        sign(&config, &key).unwrap();
        assert_eq!(verify(&config, true).unwrap().count, 1);

        // A second keygen must not clobber the signing key.
        assert!(keygen(&config, &key).is_err());
    }

    #[test]
    fn edited_artifact_fails_verification() {
        let (dir, config) = project();
        generate(&config, &[]).unwrap();
        std::fs::write(dir.path().join("rules.yaml"), "version: v3\n").unwrap();
        assert!(matches!(
            verify(&config, false).unwrap_err(),
            IntegrityError::Failed { .. }
        ));
    }

    #[test]
    fn signed_verify_without_signature_fails() {
        let (_dir, config) = project();
        generate(&config, &[]).unwrap();
        assert!(verify(&config, true).is_err());
    }
}
