use boot_addresses::PhysicalAddress;
use boot_vmem::PhysMapper;

/// Boot services run with physical memory identity mapped, so a physical
/// address is directly usable as a pointer.
///
/// The loader's own address space keeps the identity map for every direct
/// mapped range, so this stays valid after loading it.
pub struct IdentityMapper;

impl PhysMapper for IdentityMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { &mut *(pa.as_u64() as *mut T) }
    }
}
