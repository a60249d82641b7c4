//! Load-kind sharpening decisions.
//!
//! Pure decision tables: all heap, JIT and image facts are collected by the
//! caller into the input structs, and the functions here only pick the load
//! strategy. The orderings below are behavior, not style; reordering the
//! arms changes which kind wins when several apply.

use serde::{Deserialize, Serialize};

/// What kind of compilation is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompilationKind {
    BootImage,
    BootImageExtension,
    AppAot,
    Jit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    pub kind: CompilationKind,
    /// Position-independent code. Off only in test configurations, which do
    /// not sharpen.
    pub compile_pic: bool,
    /// App AOT compilation that also produces an app image.
    pub app_image: bool,
    /// JIT compiling into the shared (zygote) code region, which cannot
    /// embed movable literals.
    pub jit_for_shared_code: bool,
    pub debuggable: bool,
}

impl CompilerConfig {
    pub fn generating_boot_image(&self) -> bool {
        matches!(self.kind, CompilationKind::BootImage | CompilationKind::BootImageExtension)
    }

    pub fn generating_image(&self) -> bool {
        self.generating_boot_image() || self.app_image
    }
}

/* ---------- method load ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodLoadKind {
    /// The callee is the method being compiled; reuse its own method pointer.
    Recursive,
    BootImageLinkTimePcRelative,
    BootImageRelRo,
    AppImageRelRo,
    BssEntry,
    /// Embed the method pointer directly in JIT code.
    JitDirectAddress,
    RuntimeCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodePtrLocation {
    CallSelf,
    CallCriticalNative,
    CallArtMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchInfo {
    pub method_load_kind: MethodLoadKind,
    pub code_ptr_location: CodePtrLocation,
    /// Direct method address under `JitDirectAddress`, 0 otherwise.
    pub method_load_data: u64,
}

pub struct MethodSharpenInput<'a> {
    pub config: &'a CompilerConfig,
    /// The callee is the method being compiled.
    pub is_recursive_call: bool,
    pub for_interface_call: bool,
    /// Default interface methods reached through invokevirtual are copied
    /// methods; the runtime wants the canonical one for interface dispatch.
    pub callee_is_default_method: bool,
    pub callee_in_boot_image: bool,
    /// The callee's declaring class is in the set of classes going into the
    /// image currently being generated.
    pub callee_is_image_class: bool,
    pub has_method_id: bool,
    pub jit_can_encode_method: bool,
    pub callee_address: u64,
    pub callee_is_critical_native: bool,
}

/// Pick the method load kind and code pointer location for a static or
/// direct call.
///
/// A method is never called through a known code pointer (the method could
/// be deoptimized under us); only a recursive call may call directly.
pub fn sharpen_load_method(input: &MethodSharpenInput<'_>) -> DispatchInfo {
    let config = input.config;
    let method_load_kind;
    let mut code_ptr_location;
    let mut method_load_data = 0u64;

    if input.is_recursive_call
        && !config.debuggable
        && (!input.for_interface_call || !input.callee_is_default_method)
    {
        method_load_kind = MethodLoadKind::Recursive;
        code_ptr_location = CodePtrLocation::CallSelf;
    } else if config.generating_boot_image() {
        method_load_kind = if !config.compile_pic {
            // Test configuration, do not sharpen.
            MethodLoadKind::RuntimeCall
        } else if input.callee_in_boot_image {
            // Only possible when extending the boot image.
            MethodLoadKind::BootImageRelRo
        } else if input.callee_is_image_class {
            MethodLoadKind::BootImageLinkTimePcRelative
        } else if !input.has_method_id {
            MethodLoadKind::RuntimeCall
        } else {
            MethodLoadKind::BssEntry
        };
        code_ptr_location = CodePtrLocation::CallArtMethod;
    } else if config.kind == CompilationKind::Jit {
        if input.jit_can_encode_method {
            method_load_kind = MethodLoadKind::JitDirectAddress;
            method_load_data = input.callee_address;
        } else {
            // Do not sharpen.
            method_load_kind = MethodLoadKind::RuntimeCall;
        }
        code_ptr_location = CodePtrLocation::CallArtMethod;
    } else if input.callee_in_boot_image {
        method_load_kind = MethodLoadKind::BootImageRelRo;
        code_ptr_location = CodePtrLocation::CallArtMethod;
    } else if !input.has_method_id {
        method_load_kind = MethodLoadKind::RuntimeCall;
        code_ptr_location = CodePtrLocation::CallArtMethod;
    } else {
        method_load_kind = if config.app_image && input.callee_is_image_class {
            MethodLoadKind::AppImageRelRo
        } else {
            MethodLoadKind::BssEntry
        };
        code_ptr_location = CodePtrLocation::CallArtMethod;
    }

    if method_load_kind != MethodLoadKind::RuntimeCall && input.callee_is_critical_native {
        code_ptr_location = CodePtrLocation::CallCriticalNative;
    }

    if config.debuggable {
        // Always go through the method pointer so instrumentation stubs are
        // not circumvented.
        code_ptr_location = CodePtrLocation::CallArtMethod;
    }

    DispatchInfo { method_load_kind, code_ptr_location, method_load_data }
}

/* ---------- class load ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassLoadKind {
    ReferrersClass,
    BootImageLinkTimePcRelative,
    BootImageRelRo,
    AppImageRelRo,
    BssEntry,
    /// .bss entry resolved without an access check against public APIs.
    BssEntryPublic,
    /// .bss entry resolved within the referrer's own package.
    BssEntryPackage,
    JitBootImageAddress,
    JitTableAddress,
    RuntimeCall,
    /// The class cannot be referenced from the compiling dex file at all.
    Invalid,
}

pub struct ClassLoadInput<'a> {
    pub config: &'a CompilerConfig,
    pub is_referrers_class: bool,
    pub needs_access_check: bool,
    /// The class resolved successfully at compile time.
    pub resolved: bool,
    pub class_in_boot_image: bool,
    pub is_image_class: bool,
    pub jit_can_encode_class: bool,
    /// JNI descriptor of the class being loaded.
    pub descriptor: &'a str,
    /// JNI descriptor of the compiling class.
    pub referrer_descriptor: &'a str,
    /// The load references the same dex file the compilation unit comes from.
    pub same_dex_file: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLoadDecision {
    pub kind: ClassLoadKind,
    /// The class will live in an image (boot or the one being generated),
    /// which lets later passes elide initialization checks.
    pub in_image: bool,
}

fn package_of(descriptor: &str) -> &str {
    match descriptor.rfind('/') {
        Some(pos) => &descriptor[..pos],
        None => "",
    }
}

pub fn compute_load_class_kind(input: &ClassLoadInput<'_>) -> ClassLoadDecision {
    let config = input.config;
    let in_current_image = config.generating_image() && input.is_image_class;

    let mut in_image = false;
    let kind = if input.is_referrers_class {
        // Loading from the compiling method's own class pointer is the
        // smallest code.
        in_image = in_current_image;
        ClassLoadKind::ReferrersClass
    } else if input.needs_access_check {
        if input.resolved {
            // A resolved class that still needs an access check is really
            // inaccessible; the check is bound to fail at runtime.
            in_image = input.class_in_boot_image || in_current_image;
            ClassLoadKind::RuntimeCall
        } else if config.kind == CompilationKind::Jit {
            // Unresolved while JITting: the instruction never succeeded in
            // the interpreter.
            ClassLoadKind::RuntimeCall
        } else if package_of(input.descriptor) == package_of(input.referrer_descriptor) {
            ClassLoadKind::BssEntryPackage
        } else {
            ClassLoadKind::BssEntryPublic
        }
    } else if config.generating_boot_image() {
        if !config.compile_pic {
            // Test configuration, do not sharpen.
            in_image = input.class_in_boot_image || in_current_image;
            ClassLoadKind::RuntimeCall
        } else if input.resolved && input.class_in_boot_image {
            in_image = true;
            ClassLoadKind::BootImageRelRo
        } else if input.resolved && input.is_image_class {
            in_image = true;
            ClassLoadKind::BootImageLinkTimePcRelative
        } else {
            ClassLoadKind::BssEntry
        }
    } else {
        in_image = input.resolved && input.class_in_boot_image;
        if config.kind == CompilationKind::Jit {
            if in_image {
                ClassLoadKind::JitBootImageAddress
            } else if input.resolved {
                if input.jit_can_encode_class {
                    ClassLoadKind::JitTableAddress
                } else {
                    // Shared JIT code cannot embed a literal the GC can move.
                    ClassLoadKind::RuntimeCall
                }
            } else {
                ClassLoadKind::RuntimeCall
            }
        } else if in_image {
            ClassLoadKind::BootImageRelRo
        } else if config.app_image && in_current_image {
            in_image = true;
            ClassLoadKind::AppImageRelRo
        } else {
            ClassLoadKind::BssEntry
        }
    };

    // A runtime or .bss load resolves the type index against the caller's
    // dex file; if the class lives in a different file that lookup cannot
    // succeed, so the load is unrepresentable.
    if !input.same_dex_file
        && matches!(
            kind,
            ClassLoadKind::RuntimeCall
                | ClassLoadKind::BssEntry
                | ClassLoadKind::BssEntryPublic
                | ClassLoadKind::BssEntryPackage
        )
    {
        return ClassLoadDecision { kind: ClassLoadKind::Invalid, in_image };
    }

    ClassLoadDecision { kind, in_image }
}

/* ---------- type checks ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeCheckKind {
    UnresolvedCheck,
    ExactCheck,
    ClassHierarchyCheck,
    AbstractClassCheck,
    InterfaceCheck,
    ArrayObjectCheck,
    ArrayCheck,
    BitstringCheck,
}

/// Facts about a resolved target class of an instanceof/checkcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFacts {
    pub is_interface: bool,
    pub is_array: bool,
    /// For arrays: the component type is java.lang.Object.
    pub component_is_object: bool,
    /// For arrays: no other runtime type is assignable to this one.
    pub cannot_be_assigned_from_other_types: bool,
    pub is_final: bool,
    pub is_abstract: bool,
    /// A subtype-check bitstring was assigned for this class under the
    /// current compilation.
    pub bitstring_assigned: bool,
}

pub fn compute_type_check_kind(klass: Option<&ClassFacts>, needs_access_check: bool) -> TypeCheckKind {
    let klass = match klass {
        Some(k) => k,
        None => return TypeCheckKind::UnresolvedCheck,
    };
    if klass.is_interface {
        TypeCheckKind::InterfaceCheck
    } else if klass.is_array {
        if klass.component_is_object {
            TypeCheckKind::ArrayObjectCheck
        } else if klass.cannot_be_assigned_from_other_types {
            TypeCheckKind::ExactCheck
        } else {
            TypeCheckKind::ArrayCheck
        }
    } else if klass.is_final {
        TypeCheckKind::ExactCheck
    } else if !needs_access_check && klass.bitstring_assigned {
        TypeCheckKind::BitstringCheck
    } else if klass.is_abstract {
        TypeCheckKind::AbstractClassCheck
    } else {
        TypeCheckKind::ClassHierarchyCheck
    }
}

/* ---------- string load ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringLoadKind {
    BootImageLinkTimePcRelative,
    BootImageRelRo,
    BssEntry,
    JitBootImageAddress,
    JitTableAddress,
    RuntimeCall,
}

pub struct StringLoadInput<'a> {
    pub config: &'a CompilerConfig,
    /// The string was found (or, for boot image compilation, resolved and
    /// allocated).
    pub resolved: bool,
    pub string_in_boot_image: bool,
    pub jit_can_encode_string: bool,
}

pub fn process_load_string(input: &StringLoadInput<'_>) -> StringLoadKind {
    let config = input.config;
    if config.generating_boot_image() {
        if config.compile_pic {
            if input.resolved {
                if input.string_in_boot_image {
                    StringLoadKind::BootImageRelRo
                } else {
                    StringLoadKind::BootImageLinkTimePcRelative
                }
            } else {
                StringLoadKind::BssEntry
            }
        } else {
            // Test configuration, do not sharpen.
            StringLoadKind::RuntimeCall
        }
    } else if config.kind == CompilationKind::Jit {
        if input.resolved {
            if input.string_in_boot_image {
                StringLoadKind::JitBootImageAddress
            } else if input.jit_can_encode_string {
                StringLoadKind::JitTableAddress
            } else {
                StringLoadKind::RuntimeCall
            }
        } else {
            StringLoadKind::RuntimeCall
        }
    } else if input.resolved && input.string_in_boot_image {
        StringLoadKind::BootImageRelRo
    } else {
        StringLoadKind::BssEntry
    }
}
